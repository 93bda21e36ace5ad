use globset::GlobSet;

use crate::error::{IntakeShieldError, Result};

/// Compiled include/exclude filters for directory scans.
/// GlobSet doesn't implement Debug, so we implement it manually.
pub struct PathFilter {
    include: Option<GlobSet>,
    exclude: GlobSet,
}

impl std::fmt::Debug for PathFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PathFilter")
            .field("include", &self.include.as_ref().map(|_| "<GlobSet>"))
            .field("exclude", &"<GlobSet>")
            .finish()
    }
}

impl PathFilter {
    /// Compile glob patterns. An empty include list admits every path.
    pub fn compile(include: &[String], exclude: &[String]) -> Result<Self> {
        let include = if include.is_empty() {
            None
        } else {
            Some(build_globset(include)?)
        };
        Ok(Self {
            include,
            exclude: build_globset(exclude)?,
        })
    }

    /// Whether a path should be scanned. Exclusion wins over inclusion.
    pub fn admits(&self, path: &std::path::Path) -> bool {
        if self.exclude.is_match(path) {
            return false;
        }
        match &self.include {
            Some(set) => set.is_match(path),
            None => true,
        }
    }
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = globset::GlobSetBuilder::new();
    for pattern in patterns {
        let glob = globset::Glob::new(pattern).map_err(|e| IntakeShieldError::GlobPattern {
            pattern: pattern.clone(),
            reason: e.to_string(),
        })?;
        builder.add(glob);
    }
    builder.build().map_err(|e| IntakeShieldError::GlobPattern {
        pattern: String::new(),
        reason: e.to_string(),
    })
}
