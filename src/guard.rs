//! Path canonicalization guard.
//!
//! Resolves an untrusted file reference against a fixed base directory. The
//! lexical pass ([`resolve`]) never touches the filesystem; [`PathGuard`]
//! adds a real-path pass so a symlink inside the base cannot lead out of it.
//!
//! Order matters:
//! 1. empty input is rejected,
//! 2. percent-escapes are decoded exactly once,
//! 3. the decoded reference is normalized with `/` and `\` both treated as
//!    separators, and absolute references or parent segments are rejected,
//! 4. the result is joined onto the base,
//! 5. the candidate must have the base as a component-aligned prefix.

use anyhow::Context;
use std::path::{Component, Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TraversalError {
    #[error("missing path")]
    MissingInput,
    #[error("invalid path encoding")]
    InvalidEncoding,
    #[error("path outside base directory")]
    OutsideBase,
}

impl TraversalError {
    pub fn code(&self) -> &'static str {
        match self {
            TraversalError::MissingInput => "MissingInput",
            TraversalError::InvalidEncoding => "InvalidEncoding",
            TraversalError::OutsideBase => "OutsideBase",
        }
    }
}

/// Lexically resolve `input` under `base`.
///
/// The returned path is `base` joined with zero or more normal segments. An
/// input that normalizes to nothing (`"."`, `"./"`) resolves to `base` itself;
/// callers decide whether a directory is acceptable.
pub fn resolve(base: &Path, input: &str) -> Result<PathBuf, TraversalError> {
    if input.is_empty() {
        return Err(TraversalError::MissingInput);
    }
    let decoded = decode_once(input)?;
    let relative = normalize(&decoded)?;
    let candidate = if relative.as_os_str().is_empty() {
        base.to_path_buf()
    } else {
        base.join(&relative)
    };
    ensure_contained(base, &candidate)?;
    Ok(candidate)
}

/// Percent-decode a single time. The decoded text is never decoded again, so
/// `%252e%252e` stays the literal segment `%2e%2e`.
fn decode_once(input: &str) -> Result<String, TraversalError> {
    let bytes = input.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let escape_ok = bytes
                .get(i + 1..i + 3)
                .is_some_and(|hex| hex.iter().all(u8::is_ascii_hexdigit));
            if !escape_ok {
                return Err(TraversalError::InvalidEncoding);
            }
            i += 3;
        } else {
            i += 1;
        }
    }
    let decoded = urlencoding::decode(input).map_err(|_| TraversalError::InvalidEncoding)?;
    if decoded.contains('\0') {
        return Err(TraversalError::InvalidEncoding);
    }
    Ok(decoded.into_owned())
}

fn normalize(decoded: &str) -> Result<PathBuf, TraversalError> {
    if is_absolute_reference(decoded) {
        return Err(TraversalError::OutsideBase);
    }
    let mut relative = PathBuf::new();
    for segment in decoded.split(['/', '\\']) {
        match segment {
            "" | "." => {}
            // Rejected even when it would collapse back inside the base:
            // `a/../../x` and `../base-sibling/x` must never be rewritten into
            // a different in-base file.
            ".." => return Err(TraversalError::OutsideBase),
            name => relative.push(name),
        }
    }
    // A segment such as `C:` can still parse as a prefix on some platforms.
    if !relative.components().all(|c| matches!(c, Component::Normal(_))) {
        return Err(TraversalError::OutsideBase);
    }
    Ok(relative)
}

/// Rooted on any platform: `/x`, `\x`, `\\server\share`, `C:\x`, `C:x`.
fn is_absolute_reference(decoded: &str) -> bool {
    if decoded.starts_with(['/', '\\']) || Path::new(decoded).is_absolute() {
        return true;
    }
    let mut chars = decoded.chars();
    matches!((chars.next(), chars.next()), (Some(drive), Some(':')) if drive.is_ascii_alphabetic())
}

fn ensure_contained(base: &Path, candidate: &Path) -> Result<(), TraversalError> {
    // strip_prefix compares whole components, so `/srv/files-secret` is not
    // under `/srv/files`.
    let relative = candidate
        .strip_prefix(base)
        .map_err(|_| TraversalError::OutsideBase)?;
    if relative.is_absolute() || !relative.components().all(|c| matches!(c, Component::Normal(_))) {
        return Err(TraversalError::OutsideBase);
    }
    Ok(())
}

/// Check that the symlink-resolved form of `candidate` stays under
/// `real_base`, which must itself already be canonical.
///
/// A candidate that does not exist yet is judged by its deepest existing
/// ancestor. A dangling symlink is rejected outright since its target could
/// be created later.
pub fn verify_real(real_base: &Path, candidate: &Path) -> Result<(), TraversalError> {
    let mut probe = candidate;
    let real = loop {
        match dunce::canonicalize(probe) {
            Ok(real) => break real,
            Err(_) if std::fs::symlink_metadata(probe).is_ok() => {
                return Err(TraversalError::OutsideBase);
            }
            Err(_) => probe = probe.parent().ok_or(TraversalError::OutsideBase)?,
        }
    };
    if real.starts_with(real_base) {
        Ok(())
    } else {
        Err(TraversalError::OutsideBase)
    }
}

/// A base directory fixed at startup, plus the policy for the real-path pass.
#[derive(Debug, Clone)]
pub struct PathGuard {
    base: PathBuf,
    check_symlinks: bool,
}

impl PathGuard {
    pub fn new(base: &Path, check_symlinks: bool) -> anyhow::Result<Self> {
        let base = dunce::canonicalize(base)
            .with_context(|| format!("canonicalizing base directory {}", base.display()))?;
        if !base.is_dir() {
            anyhow::bail!("base directory is not a directory: {}", base.display());
        }
        Ok(Self { base, check_symlinks })
    }

    pub fn base(&self) -> &Path {
        &self.base
    }

    /// Lexical resolution followed, when enabled, by the real-path check.
    /// Touches the filesystem; call from a blocking context.
    pub fn resolve(&self, input: &str) -> Result<PathBuf, TraversalError> {
        let candidate = resolve(&self.base, input)?;
        if self.check_symlinks {
            verify_real(&self.base, &candidate)?;
        }
        Ok(candidate)
    }

    /// Path of an accepted result relative to the base, for display.
    pub fn relative<'a>(&self, resolved: &'a Path) -> &'a Path {
        resolved.strip_prefix(&self.base).unwrap_or(resolved)
    }
}
