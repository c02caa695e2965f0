//! Windows registry hive (HKEY_CURRENT_USER)

use tracing::debug;
use windows::Win32::Foundation::{ERROR_FILE_NOT_FOUND, ERROR_SUCCESS, WIN32_ERROR};
use windows::Win32::System::Registry::{
    HKEY, HKEY_CURRENT_USER, KEY_READ, KEY_WRITE, REG_DWORD, REG_EXPAND_SZ, REG_OPTION_NON_VOLATILE,
    REG_SZ, REG_VALUE_TYPE, RegCloseKey, RegCreateKeyExW, RegDeleteValueW, RegQueryValueExW,
    RegSetValueExW,
};
use windows::core::{HSTRING, PCWSTR};

use super::hive::{HiveKey, RegValue, SettingsHive, StoreError};

fn describe(code: WIN32_ERROR) -> String {
    windows::core::Error::from(code.to_hresult()).message().to_string()
}

#[derive(Debug, Clone, Copy, Default)]
pub struct WindowsRegistry;

impl SettingsHive for WindowsRegistry {
    type Key = RegistryKey;

    fn create_key(&self, path: &str) -> Result<RegistryKey, StoreError> {
        let subkey = HSTRING::from(path);
        let mut hkey = HKEY::default();
        // SAFETY: all pointers reference live locals for the duration of the call
        let status = unsafe {
            RegCreateKeyExW(
                HKEY_CURRENT_USER,
                &subkey,
                0,
                PCWSTR::null(),
                REG_OPTION_NON_VOLATILE,
                KEY_READ | KEY_WRITE,
                None,
                &mut hkey,
                None,
            )
        };
        if status != ERROR_SUCCESS {
            return Err(StoreError::Open {
                path: format!("HKCU\\{path}"),
                reason: describe(status),
            });
        }
        debug!(key = %path, "Opened registry key");
        Ok(RegistryKey { hkey })
    }
}

pub struct RegistryKey {
    hkey: HKEY,
}

impl RegistryKey {
    fn query(&self, name: &HSTRING, kind: &mut REG_VALUE_TYPE, data: Option<&mut [u8]>) -> (WIN32_ERROR, u32) {
        let mut len = data.as_ref().map_or(0, |d| d.len() as u32);
        let ptr = data.map(|d| d.as_mut_ptr());
        // SAFETY: `ptr` (if any) points at a buffer of `len` bytes
        let status = unsafe {
            RegQueryValueExW(
                self.hkey,
                name,
                None,
                Some(kind as *mut REG_VALUE_TYPE),
                ptr,
                Some(&mut len as *mut u32),
            )
        };
        (status, len)
    }
}

impl HiveKey for RegistryKey {
    fn get_value(&self, name: &str) -> Option<RegValue> {
        let wide_name = HSTRING::from(name);
        let mut kind = REG_VALUE_TYPE::default();
        let (status, len) = self.query(&wide_name, &mut kind, None);
        if status != ERROR_SUCCESS {
            if status != ERROR_FILE_NOT_FOUND {
                debug!(name, error = %describe(status), "Registry value unreadable");
            }
            return None;
        }

        let mut buf = vec![0u8; len as usize];
        let (status, len) = self.query(&wide_name, &mut kind, Some(&mut buf));
        if status != ERROR_SUCCESS {
            return None;
        }
        buf.truncate(len as usize);

        Some(match kind {
            REG_DWORD if buf.len() == 4 => {
                RegValue::Dword(u32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]))
            }
            REG_SZ | REG_EXPAND_SZ => {
                let wide: Vec<u16> = buf
                    .chunks_exact(2)
                    .map(|c| u16::from_le_bytes([c[0], c[1]]))
                    .take_while(|&c| c != 0)
                    .collect();
                RegValue::String(String::from_utf16_lossy(&wide))
            }
            _ => RegValue::Unsupported("binary"),
        })
    }

    fn set_value(&mut self, name: &str, value: RegValue) -> Result<(), StoreError> {
        let (kind, bytes) = match value {
            RegValue::Dword(d) => (REG_DWORD, d.to_le_bytes().to_vec()),
            RegValue::String(s) => (
                REG_SZ,
                s.encode_utf16()
                    .chain(std::iter::once(0))
                    .flat_map(u16::to_le_bytes)
                    .collect(),
            ),
            RegValue::Unsupported(kind) => {
                return Err(StoreError::Write {
                    name: name.to_string(),
                    reason: format!("cannot store {kind} values"),
                });
            }
        };
        let wide_name = HSTRING::from(name);
        // SAFETY: `bytes` outlives the call
        let status = unsafe { RegSetValueExW(self.hkey, &wide_name, 0, kind, Some(&bytes)) };
        if status != ERROR_SUCCESS {
            return Err(StoreError::Write {
                name: name.to_string(),
                reason: describe(status),
            });
        }
        Ok(())
    }

    fn delete_value(&mut self, name: &str) -> Result<(), StoreError> {
        let wide_name = HSTRING::from(name);
        // SAFETY: plain handle + string call
        let status = unsafe { RegDeleteValueW(self.hkey, &wide_name) };
        if status != ERROR_SUCCESS && status != ERROR_FILE_NOT_FOUND {
            return Err(StoreError::Write {
                name: name.to_string(),
                reason: describe(status),
            });
        }
        Ok(())
    }
}

impl Drop for RegistryKey {
    fn drop(&mut self) {
        // SAFETY: handle came from RegCreateKeyExW and is closed once
        let _ = unsafe { RegCloseKey(self.hkey) };
    }
}
