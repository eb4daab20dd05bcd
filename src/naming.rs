// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Application naming.
//!
//! Users name their applications however they like. The container runtime
//! does not. Every user-supplied name is normalized into a __sanitized name__
//! that only contains `[a-z0-9-]`. The sanitized name is the true identity of
//! an application: the container name, the image tag, the metadata file, and
//! the working directory are all derived from it.
//!
//! Sanitization is lossy. Two distinct user names like "My App" and "my-app!"
//! collapse into the same sanitized name, and therefore the same application.

use std::fmt::{Display, Formatter, Result as FmtResult};

/// Normalize user-supplied name into runtime-safe identifier.
///
/// Lowercases, turns spaces into hyphens, and strips everything outside of
/// `[a-z0-9-]`. Pure and total. The empty string is a valid output, so
/// callers must reject it before use, see [`AppName::new`].
pub fn sanitize(name: impl AsRef<str>) -> String {
    name.as_ref()
        .replace(' ', "-")
        .to_lowercase()
        .chars()
        .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || *c == '-')
        .collect()
}

/// Name of a deployed application.
///
/// Keeps the name the user supplied for display purposes along with its
/// sanitized form used for everything else.
///
/// # Invariant
///
/// - Sanitized name is never empty.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AppName {
    raw: String,
    sanitized: String,
}

impl AppName {
    /// Construct new application name.
    ///
    /// # Errors
    ///
    /// - Return [`EmptyName`] if nothing survives sanitization.
    pub fn new(raw: impl Into<String>) -> Result<Self> {
        let raw = raw.into();
        let sanitized = sanitize(&raw);
        if sanitized.is_empty() {
            return Err(EmptyName { raw });
        }

        Ok(Self { raw, sanitized })
    }

    /// Name exactly as the user supplied it.
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// Sanitized identity key.
    pub fn sanitized(&self) -> &str {
        &self.sanitized
    }

    /// Name of the container running this application.
    pub fn container_name(&self) -> &str {
        &self.sanitized
    }

    /// Image tag built or pulled for this application.
    ///
    /// Always `<namespace>/<sanitized>:latest`. Successive builds replace the
    /// previous image under the same tag.
    pub fn image_tag(&self, namespace: impl AsRef<str>) -> String {
        format!("{}/{}:latest", namespace.as_ref(), self.sanitized)
    }
}

impl Display for AppName {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        fmt.write_str(&self.sanitized)
    }
}

/// Application name sanitizes down to nothing.
#[derive(Clone, Debug, thiserror::Error)]
#[error("application name {raw:?} has no runtime-safe characters")]
pub struct EmptyName {
    pub raw: String,
}

/// Friendly result alias :3
pub type Result<T, E = EmptyName> = std::result::Result<T, E>;
