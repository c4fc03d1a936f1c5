//! Rust-friendly wrappers over the variable services of the UEFI runtime services table.
//!
//! UEFI Spec Documentation: [8.2. Variable Services](https://uefi.org/specs/UEFI/2.10/08_Services_Runtime_Services.html#variable-services)
//!
//! ## License
//!
//! Copyright (C) Microsoft Corporation. All rights reserved.
//!
//! SPDX-License-Identifier: BSD-2-Clause-Patent
//!

#[cfg(any(test, feature = "mockall"))]
use mockall::automock;

use alloc::vec::Vec;
use core::{
    ffi::c_void,
    fmt::Debug,
    ptr,
    sync::atomic::{AtomicPtr, Ordering},
};

use r_efi::efi;

use crate::{invalid_name, Result, VariableAttributes, VariableError, VariableStore};

/// Interface for the variable services of the UEFI runtime services.
///
/// Names are UCS-2 and must be null-terminated.
#[cfg_attr(any(test, feature = "mockall"), automock)]
pub trait RuntimeServices {
    /// Gets a UEFI variable.
    ///
    /// Returns a tuple of (data, attributes).
    ///
    /// UEFI Spec Documentation: [8.2.1. EFI_RUNTIME_SERVICES.GetVariable()](https://uefi.org/specs/UEFI/2.10/08_Services_Runtime_Services.html#getvariable)
    fn get_variable(&self, name: &[u16], namespace: &efi::Guid) -> core::result::Result<(Vec<u8>, u32), efi::Status>;

    /// Sets a UEFI variable. Zero-length data deletes the variable.
    ///
    /// UEFI Spec Documentation: [8.2.3. EFI_RUNTIME_SERVICES.SetVariable()](https://uefi.org/specs/UEFI/2.10/08_Services_Runtime_Services.html#setvariable)
    fn set_variable(
        &self,
        name: &[u16],
        namespace: &efi::Guid,
        attributes: u32,
        data: &[u8],
    ) -> core::result::Result<(), efi::Status>;
}

/// The UEFI runtime services.
/// Wrapper around [`efi::RuntimeServices`].
pub struct StandardRuntimeServices {
    efi_runtime_services: AtomicPtr<efi::RuntimeServices>,
}

impl StandardRuntimeServices {
    /// Create a new StandardRuntimeServices with the provided [efi::RuntimeServices].
    pub fn new(efi_runtime_services: &efi::RuntimeServices) -> Self {
        Self { efi_runtime_services: AtomicPtr::new(efi_runtime_services as *const _ as *mut _) }
    }

    fn efi_runtime_services(&self) -> Option<&efi::RuntimeServices> {
        // SAFETY: The table is provided by the firmware and outlives this wrapper.
        unsafe { self.efi_runtime_services.load(Ordering::Relaxed).as_ref() }
    }
}

impl Debug for StandardRuntimeServices {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self.efi_runtime_services() {
            Some(rs) => f
                .debug_struct("StandardRuntimeServices")
                .field("get_variable", &(rs.get_variable as usize))
                .field("set_variable", &(rs.set_variable as usize))
                .finish(),
            None => f.debug_struct("StandardRuntimeServices").field("efi_runtime_services", &"null").finish(),
        }
    }
}

impl RuntimeServices for StandardRuntimeServices {
    fn get_variable(&self, name: &[u16], namespace: &efi::Guid) -> core::result::Result<(Vec<u8>, u32), efi::Status> {
        if !name.contains(&0) {
            return Err(efi::Status::INVALID_PARAMETER);
        }
        let rs = self.efi_runtime_services().ok_or(efi::Status::NOT_STARTED)?;
        let get_variable = rs.get_variable;

        // Keep a local copy of name, the firmware signature takes a mutable pointer.
        let mut name = name.to_vec();
        let mut namespace = *namespace;
        let mut data = Vec::<u8>::new();

        // First call sizes the buffer, the second reads into it. A variable that grows in between
        // is reported as BUFFER_TOO_SMALL rather than retried forever.
        let mut first_attempt = true;
        loop {
            let mut data_size = data.len();
            let mut attributes = 0u32;
            let status = get_variable(
                name.as_mut_ptr(),
                ptr::addr_of_mut!(namespace),
                ptr::addr_of_mut!(attributes),
                ptr::addr_of_mut!(data_size),
                if data.is_empty() { ptr::null_mut() } else { data.as_mut_ptr() as *mut c_void },
            );

            match status {
                efi::Status::SUCCESS => {
                    data.truncate(data_size);
                    return Ok((data, attributes));
                }
                efi::Status::BUFFER_TOO_SMALL if first_attempt => {
                    first_attempt = false;
                    data.resize(data_size, 0);
                }
                status => return Err(status),
            }
        }
    }

    fn set_variable(
        &self,
        name: &[u16],
        namespace: &efi::Guid,
        attributes: u32,
        data: &[u8],
    ) -> core::result::Result<(), efi::Status> {
        if !name.contains(&0) {
            return Err(efi::Status::INVALID_PARAMETER);
        }
        let rs = self.efi_runtime_services().ok_or(efi::Status::NOT_STARTED)?;
        let set_variable = rs.set_variable;

        let mut name = name.to_vec();
        let mut namespace = *namespace;
        let status = set_variable(
            name.as_mut_ptr(),
            ptr::addr_of_mut!(namespace),
            attributes,
            data.len(),
            data.as_ptr() as *mut c_void,
        );

        if status.is_error() {
            Err(status)
        } else {
            Ok(())
        }
    }
}

/// [`VariableStore`] backed by the firmware variable services.
#[derive(Debug)]
pub struct RuntimeVariableStore<R: RuntimeServices> {
    runtime_services: R,
}

impl<R: RuntimeServices> RuntimeVariableStore<R> {
    /// Creates a variable store issuing calls through `runtime_services`.
    pub fn new(runtime_services: R) -> Self {
        Self { runtime_services }
    }

    /// Converts a variable name into the null-terminated UCS-2 form the firmware expects.
    fn ucs2_name(name: &str) -> Result<Vec<u16>> {
        if name.is_empty() || name.chars().any(|c| c == '\0' || c.len_utf16() != 1) {
            return Err(invalid_name(name));
        }
        Ok(name.encode_utf16().chain(core::iter::once(0)).collect())
    }
}

impl<R: RuntimeServices> VariableStore for RuntimeVariableStore<R> {
    fn get_variable(&self, namespace: &efi::Guid, name: &str) -> Result<(Vec<u8>, VariableAttributes)> {
        let ucs2_name = Self::ucs2_name(name)?;
        let (data, attributes) = self.runtime_services.get_variable(&ucs2_name, namespace)?;
        Ok((data, VariableAttributes::from_bits_retain(attributes)))
    }

    fn set_variable(
        &self,
        namespace: &efi::Guid,
        name: &str,
        data: &[u8],
        attributes: VariableAttributes,
    ) -> Result<()> {
        let ucs2_name = Self::ucs2_name(name)?;
        if data.is_empty() {
            // Zero-length data deletes the variable in firmware, use delete_variable for that.
            return Err(VariableError::Firmware(efi::Status::INVALID_PARAMETER));
        }
        self.runtime_services.set_variable(&ucs2_name, namespace, attributes.bits(), data)?;
        Ok(())
    }

    fn delete_variable(&self, namespace: &efi::Guid, name: &str) -> Result<()> {
        let ucs2_name = Self::ucs2_name(name)?;
        self.runtime_services.set_variable(&ucs2_name, namespace, 0, &[])?;
        log::debug!("deleted UEFI variable {name}");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::FWUPDATE_NAMESPACE;
    use core::{mem, slice};

    macro_rules! runtime_services {
        ($($efi_services:ident = $efi_service_fn:ident),*) => {{
            let efi_runtime_services = unsafe {
                #[allow(unused_mut)]
                let mut rs = mem::MaybeUninit::<efi::RuntimeServices>::zeroed();
                $(
                rs.assume_init_mut().$efi_services = $efi_service_fn;
                )*
                rs.assume_init()
            };
            efi_runtime_services
        }};
    }

    const KNOWN_NAME: [u16; 3] = [b'f' as u16, b'w' as u16, 0];
    const UNKNOWN_NAME: [u16; 2] = [b'x' as u16, 0];
    const KNOWN_DATA: [u8; 6] = [1, 2, 3, 4, 5, 6];
    const KNOWN_ATTRIBUTES: u32 = 0x7;

    extern "efiapi" fn mock_efi_get_variable(
        name: *mut u16,
        namespace: *mut efi::Guid,
        attributes: *mut u32,
        data_size: *mut usize,
        data: *mut c_void,
    ) -> efi::Status {
        unsafe {
            if slice::from_raw_parts(name, UNKNOWN_NAME.len()) == UNKNOWN_NAME {
                return efi::Status::NOT_FOUND;
            }
            assert_eq!(slice::from_raw_parts(name, KNOWN_NAME.len()), KNOWN_NAME);
            assert_eq!(*namespace, FWUPDATE_NAMESPACE);

            *attributes = KNOWN_ATTRIBUTES;
            if *data_size < KNOWN_DATA.len() {
                *data_size = KNOWN_DATA.len();
                return efi::Status::BUFFER_TOO_SMALL;
            }
            *data_size = KNOWN_DATA.len();
            ptr::copy_nonoverlapping(KNOWN_DATA.as_ptr(), data as *mut u8, KNOWN_DATA.len());
        }
        efi::Status::SUCCESS
    }

    extern "efiapi" fn mock_efi_set_variable(
        name: *mut u16,
        namespace: *mut efi::Guid,
        attributes: u32,
        data_size: usize,
        data: *mut c_void,
    ) -> efi::Status {
        unsafe {
            if *name == 0 {
                return efi::Status::INVALID_PARAMETER;
            }
            assert_eq!(slice::from_raw_parts(name, KNOWN_NAME.len()), KNOWN_NAME);
            assert_eq!(*namespace, FWUPDATE_NAMESPACE);
            assert_eq!(attributes, KNOWN_ATTRIBUTES);
            assert_eq!(slice::from_raw_parts(data as *const u8, data_size), KNOWN_DATA);
        }
        efi::Status::SUCCESS
    }

    #[test]
    fn test_get_variable_sizes_then_reads() {
        let table = runtime_services!(get_variable = mock_efi_get_variable);
        let rs = StandardRuntimeServices::new(&table);

        let (data, attributes) = rs.get_variable(&KNOWN_NAME, &FWUPDATE_NAMESPACE).unwrap();
        assert_eq!(data, KNOWN_DATA);
        assert_eq!(attributes, KNOWN_ATTRIBUTES);
    }

    #[test]
    fn test_get_variable_not_found() {
        let table = runtime_services!(get_variable = mock_efi_get_variable);
        let rs = StandardRuntimeServices::new(&table);

        assert_eq!(rs.get_variable(&UNKNOWN_NAME, &FWUPDATE_NAMESPACE), Err(efi::Status::NOT_FOUND));
    }

    #[test]
    fn test_get_variable_rejects_unterminated_name() {
        let table = runtime_services!(get_variable = mock_efi_get_variable);
        let rs = StandardRuntimeServices::new(&table);

        assert_eq!(rs.get_variable(&[b'f' as u16], &FWUPDATE_NAMESPACE), Err(efi::Status::INVALID_PARAMETER));
    }

    #[test]
    fn test_set_variable() {
        let table = runtime_services!(set_variable = mock_efi_set_variable);
        let rs = StandardRuntimeServices::new(&table);

        assert_eq!(rs.set_variable(&KNOWN_NAME, &FWUPDATE_NAMESPACE, KNOWN_ATTRIBUTES, &KNOWN_DATA), Ok(()));
        assert_eq!(
            rs.set_variable(&[0], &FWUPDATE_NAMESPACE, KNOWN_ATTRIBUTES, &KNOWN_DATA),
            Err(efi::Status::INVALID_PARAMETER)
        );
    }

    #[test]
    fn test_store_converts_names_to_ucs2() {
        let mut rs = MockRuntimeServices::new();
        rs.expect_get_variable()
            .once()
            .withf(|name, namespace| {
                assert_eq!(name, [b'a' as u16, b'-' as u16, b'0' as u16, 0].as_slice());
                assert_eq!(namespace, &FWUPDATE_NAMESPACE);
                true
            })
            .returning(|_, _| Ok((vec![0xAA], 0x7)));

        let store = RuntimeVariableStore::new(rs);
        let (data, attributes) = store.get_variable(&FWUPDATE_NAMESPACE, "a-0").unwrap();
        assert_eq!(data, vec![0xAA]);
        assert_eq!(attributes, VariableAttributes::PERSISTENT);
    }

    #[test]
    fn test_store_maps_not_found() {
        let mut rs = MockRuntimeServices::new();
        rs.expect_get_variable().once().returning(|_, _| Err(efi::Status::NOT_FOUND));

        let store = RuntimeVariableStore::new(rs);
        assert_eq!(store.get_variable(&FWUPDATE_NAMESPACE, "missing"), Err(VariableError::NotFound));
    }

    #[test]
    fn test_store_rejects_unrepresentable_names() {
        let store = RuntimeVariableStore::new(MockRuntimeServices::new());

        assert!(matches!(store.get_variable(&FWUPDATE_NAMESPACE, ""), Err(VariableError::InvalidName(_))));
        assert!(matches!(store.get_variable(&FWUPDATE_NAMESPACE, "a\u{1F600}"), Err(VariableError::InvalidName(_))));
    }

    #[test]
    fn test_store_delete_writes_empty_data() {
        let mut rs = MockRuntimeServices::new();
        rs.expect_set_variable()
            .once()
            .withf(|name, namespace, attributes, data| {
                name == [b'v' as u16, 0].as_slice()
                    && namespace == &FWUPDATE_NAMESPACE
                    && *attributes == 0
                    && data.is_empty()
            })
            .returning(|_, _, _, _| Ok(()));

        let store = RuntimeVariableStore::new(rs);
        assert_eq!(store.delete_variable(&FWUPDATE_NAMESPACE, "v"), Ok(()));
    }

    #[test]
    fn test_store_set_passes_attributes() {
        let mut rs = MockRuntimeServices::new();
        rs.expect_set_variable()
            .once()
            .withf(|_, _, attributes, data| *attributes == 0x7 && data == [1u8, 2].as_slice())
            .returning(|_, _, _, _| Err(efi::Status::OUT_OF_RESOURCES));

        let store = RuntimeVariableStore::new(rs);
        assert_eq!(
            store.set_variable(&FWUPDATE_NAMESPACE, "v", &[1, 2], VariableAttributes::PERSISTENT),
            Err(VariableError::Firmware(efi::Status::OUT_OF_RESOURCES))
        );
    }
}
