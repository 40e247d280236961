//! NVS (Non-Volatile Storage) adapter.
//!
//! Implements both [`StoragePort`] (raw blobs) and [`ConfigPort`] (the
//! typed [`PersistedState`] record, postcard-encoded under `hvac/state`).
//!
//! - Atomic writes: ESP-IDF NVS commits are atomic per `nvs_commit()`.
//! - A record whose stored length does not match what postcard consumes is
//!   reported as [`ConfigError::Corrupted`]; one whose leading version byte
//!   differs from [`STATE_VERSION`] as [`ConfigError::VersionMismatch`].

use log::{debug, info, warn};

use crate::app::ports::{ConfigError, ConfigPort, StorageError, StoragePort};
use crate::config::{PersistedState, STATE_VERSION};

#[cfg(not(target_os = "espidf"))]
use std::collections::HashMap;

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;

const STATE_NAMESPACE: &str = "hvac";
const STATE_KEY: &str = "state";

/// Read buffer for the state record.  The encoded record is a handful of
/// bytes; anything longer than this is not ours.
const RECORD_BUF_LEN: usize = 64;

/// NVS namespace and key names are limited to 15 characters.
#[cfg(target_os = "espidf")]
const NVS_NAME_MAX: usize = 15;

pub struct NvsAdapter {
    #[cfg(not(target_os = "espidf"))]
    store: std::cell::RefCell<HashMap<String, Vec<u8>>>,
}

impl NvsAdapter {
    /// Create a new NvsAdapter and initialise NVS flash.
    ///
    /// On a partition with no free pages or written by a newer NVS version
    /// the partition is erased and re-initialised.
    pub fn new() -> Result<Self, ConfigError> {
        #[cfg(target_os = "espidf")]
        {
            // SAFETY: nvs_flash_init / nvs_flash_erase are called from the
            // single main-task context before any concurrent NVS access.
            let ret = unsafe { nvs_flash_init() };
            if ret == ESP_ERR_NVS_NO_FREE_PAGES as i32
                || ret == ESP_ERR_NVS_NEW_VERSION_FOUND as i32
            {
                warn!("NVS: erasing and re-initialising flash partition");
                if unsafe { nvs_flash_erase() } != ESP_OK as i32 {
                    return Err(ConfigError::IoError);
                }
                if unsafe { nvs_flash_init() } != ESP_OK as i32 {
                    return Err(ConfigError::IoError);
                }
            } else if ret != ESP_OK as i32 {
                return Err(ConfigError::IoError);
            }
            info!("NvsAdapter: ESP-IDF NVS initialised");
        }

        #[cfg(not(target_os = "espidf"))]
        info!("NvsAdapter: simulation backend");

        Ok(Self {
            #[cfg(not(target_os = "espidf"))]
            store: std::cell::RefCell::new(HashMap::new()),
        })
    }

    #[cfg(not(target_os = "espidf"))]
    fn composite_key(namespace: &str, key: &str) -> String {
        format!("{}::{}", namespace, key)
    }

    /// NUL-terminated copy of an NVS name, truncated to the NVS limit.
    #[cfg(target_os = "espidf")]
    fn c_name(name: &str) -> [u8; NVS_NAME_MAX + 1] {
        let mut buf = [0u8; NVS_NAME_MAX + 1];
        let bytes = name.as_bytes();
        let len = bytes.len().min(NVS_NAME_MAX);
        buf[..len].copy_from_slice(&bytes[..len]);
        buf
    }

    /// Open an NVS namespace, execute a closure with the handle, then close.
    #[cfg(target_os = "espidf")]
    fn with_nvs_handle<F, T>(namespace: &str, write: bool, f: F) -> Result<T, i32>
    where
        F: FnOnce(nvs_handle_t) -> Result<T, i32>,
    {
        let ns = Self::c_name(namespace);
        let mut handle: nvs_handle_t = 0;
        let mode = if write {
            nvs_open_mode_t_NVS_READWRITE
        } else {
            nvs_open_mode_t_NVS_READONLY
        };

        // SAFETY: `ns` is NUL-terminated and outlives the call.
        let ret = unsafe { nvs_open(ns.as_ptr() as *const _, mode, &mut handle) };
        if ret != ESP_OK as i32 {
            return Err(ret);
        }

        let result = f(handle);
        // SAFETY: `handle` was opened above and is closed exactly once.
        unsafe {
            nvs_close(handle);
        }
        result
    }
}

/// Validate and decode a stored record of `len` bytes read into `buf`.
fn decode_record(buf: &[u8], len: usize) -> Result<PersistedState, ConfigError> {
    if len == 0 || len > buf.len() {
        return Err(ConfigError::Corrupted);
    }
    let bytes = &buf[..len];
    if bytes[0] != STATE_VERSION {
        return Err(ConfigError::VersionMismatch { found: bytes[0] });
    }
    let (state, rest) =
        postcard::take_from_bytes::<PersistedState>(bytes).map_err(|_| ConfigError::Corrupted)?;
    if !rest.is_empty() {
        return Err(ConfigError::Corrupted);
    }
    Ok(state)
}

impl ConfigPort for NvsAdapter {
    fn load(&self) -> Result<Option<PersistedState>, ConfigError> {
        if !self.exists(STATE_NAMESPACE, STATE_KEY) {
            debug!("NvsAdapter: no stored state");
            return Ok(None);
        }
        let mut buf = [0u8; RECORD_BUF_LEN];
        let len = match self.read(STATE_NAMESPACE, STATE_KEY, &mut buf) {
            Ok(len) => len,
            Err(StorageError::NotFound) => return Ok(None),
            Err(e) => {
                warn!("NvsAdapter: state read failed: {}", e);
                return Err(ConfigError::IoError);
            }
        };
        let state = decode_record(&buf, len)?;
        info!("NvsAdapter: loaded state ({} bytes)", len);
        Ok(Some(state))
    }

    fn save(&mut self, state: &PersistedState) -> Result<(), ConfigError> {
        let bytes = postcard::to_allocvec(state).map_err(|_| ConfigError::IoError)?;
        self.write(STATE_NAMESPACE, STATE_KEY, &bytes)
            .map_err(|e| match e {
                StorageError::Full => ConfigError::StorageFull,
                StorageError::NotFound | StorageError::IoError => ConfigError::IoError,
            })?;
        debug!("NvsAdapter: state saved ({} bytes)", bytes.len());
        Ok(())
    }

    fn erase(&mut self) -> Result<(), ConfigError> {
        // Opening read-write would create the namespace on a blank device.
        if !self.exists(STATE_NAMESPACE, STATE_KEY) {
            debug!("NvsAdapter: no stored state to erase");
            return Ok(());
        }
        self.delete(STATE_NAMESPACE, STATE_KEY)
            .map_err(|_| ConfigError::IoError)?;
        info!("NvsAdapter: state erased");
        Ok(())
    }
}

impl StoragePort for NvsAdapter {
    fn read(&self, namespace: &str, key: &str, buf: &mut [u8]) -> Result<usize, StorageError> {
        #[cfg(not(target_os = "espidf"))]
        {
            let composite = Self::composite_key(namespace, key);
            match self.store.borrow().get(&composite) {
                Some(data) => {
                    let len = data.len().min(buf.len());
                    buf[..len].copy_from_slice(&data[..len]);
                    Ok(data.len())
                }
                None => Err(StorageError::NotFound),
            }
        }

        #[cfg(target_os = "espidf")]
        {
            let key_buf = Self::c_name(key);
            let result = Self::with_nvs_handle(namespace, false, |handle| {
                // First call: stored size only.
                let mut size: usize = 0;
                // SAFETY: a null data pointer asks NVS for the length only.
                let ret = unsafe {
                    nvs_get_blob(
                        handle,
                        key_buf.as_ptr() as *const _,
                        core::ptr::null_mut(),
                        &mut size,
                    )
                };
                if ret != ESP_OK as i32 {
                    return Err(ret);
                }
                if size > buf.len() {
                    return Ok(size);
                }
                // SAFETY: `buf` holds at least `size` bytes.
                let ret = unsafe {
                    nvs_get_blob(
                        handle,
                        key_buf.as_ptr() as *const _,
                        buf.as_mut_ptr() as *mut _,
                        &mut size,
                    )
                };
                if ret != ESP_OK as i32 {
                    return Err(ret);
                }
                Ok(size)
            });
            match result {
                Ok(size) => Ok(size),
                Err(e) if e == ESP_ERR_NVS_NOT_FOUND as i32 => Err(StorageError::NotFound),
                Err(_) => Err(StorageError::IoError),
            }
        }
    }

    fn write(&mut self, namespace: &str, key: &str, data: &[u8]) -> Result<(), StorageError> {
        #[cfg(not(target_os = "espidf"))]
        {
            let composite = Self::composite_key(namespace, key);
            self.store.borrow_mut().insert(composite, data.to_vec());
            Ok(())
        }

        #[cfg(target_os = "espidf")]
        {
            let key_buf = Self::c_name(key);
            let result = Self::with_nvs_handle(namespace, true, |handle| {
                // SAFETY: `data` and `key_buf` outlive the call.
                let ret = unsafe {
                    nvs_set_blob(
                        handle,
                        key_buf.as_ptr() as *const _,
                        data.as_ptr() as *const _,
                        data.len(),
                    )
                };
                if ret != ESP_OK as i32 {
                    return Err(ret);
                }
                // SAFETY: open read-write handle.
                let ret = unsafe { nvs_commit(handle) };
                if ret != ESP_OK as i32 {
                    return Err(ret);
                }
                Ok(())
            });
            result.map_err(|e| {
                if e == ESP_ERR_NVS_NOT_ENOUGH_SPACE as i32 {
                    StorageError::Full
                } else {
                    StorageError::IoError
                }
            })
        }
    }

    fn delete(&mut self, namespace: &str, key: &str) -> Result<(), StorageError> {
        #[cfg(not(target_os = "espidf"))]
        {
            let composite = Self::composite_key(namespace, key);
            self.store.borrow_mut().remove(&composite);
            Ok(())
        }

        #[cfg(target_os = "espidf")]
        {
            let key_buf = Self::c_name(key);
            let result = Self::with_nvs_handle(namespace, true, |handle| {
                // SAFETY: `key_buf` is NUL-terminated.
                let ret = unsafe { nvs_erase_key(handle, key_buf.as_ptr() as *const _) };
                if ret != ESP_OK as i32 && ret != ESP_ERR_NVS_NOT_FOUND as i32 {
                    return Err(ret);
                }
                // SAFETY: open read-write handle.
                let ret = unsafe { nvs_commit(handle) };
                if ret != ESP_OK as i32 {
                    return Err(ret);
                }
                Ok(())
            });
            match result {
                // Namespace never created: nothing to delete.
                Err(e) if e == ESP_ERR_NVS_NOT_FOUND as i32 => Ok(()),
                other => other.map_err(|_| StorageError::IoError),
            }
        }
    }

    fn exists(&self, namespace: &str, key: &str) -> bool {
        #[cfg(not(target_os = "espidf"))]
        {
            let composite = Self::composite_key(namespace, key);
            self.store.borrow().contains_key(&composite)
        }

        #[cfg(target_os = "espidf")]
        {
            let key_buf = Self::c_name(key);
            let result = Self::with_nvs_handle(namespace, false, |handle| {
                // SAFETY: `key_buf` is NUL-terminated.
                let ret = unsafe {
                    nvs_find_key(handle, key_buf.as_ptr() as *const _, core::ptr::null_mut())
                };
                Ok(ret == ESP_OK as i32)
            });
            result.unwrap_or(false)
        }
    }
}
