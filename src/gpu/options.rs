//! Launch configuration for compiled kernels.

use crate::error::{Error, Result};

/// Upper bound on invocations per workgroup, shared by every WebGPU adapter
pub const MAX_INVOCATIONS_PER_WORKGROUP: u32 = 256;
/// Per-axis workgroup ceilings
pub const MAX_WORKGROUP_SIZE: [u32; 3] = [256, 256, 64];
/// Per-axis ceiling on dispatched workgroups
pub const MAX_WORKGROUPS_PER_DIMENSION: u32 = 65_535;

/// WGSL keywords plus the predeclared types generated code refers to.
const WGSL_KEYWORDS: [&str; 35] = [
    "alias", "array", "bool", "break", "case", "const", "const_assert", "continue", "continuing",
    "default", "diagnostic", "discard", "else", "enable", "f16", "f32", "false", "fn", "for", "i32",
    "if", "let", "loop", "override", "requires", "return", "struct", "switch", "true", "u32", "var",
    "vec2", "vec3", "vec4", "while",
];

const DEFAULT_WORKGROUP: [u32; 1] = [16];
const DEFAULT_DISPATCH: [u32; 1] = [4];
const DEFAULT_NAME: &str = "func";

/// Workgroup shape, dispatch shape and entry point name of a kernel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KernelOptions {
    workgroup: Vec<u32>,
    dispatch: Vec<u32>,
    name: String,
}

impl Default for KernelOptions {
    fn default() -> Self {
        Self {
            workgroup: DEFAULT_WORKGROUP.to_vec(),
            dispatch: DEFAULT_DISPATCH.to_vec(),
            name: DEFAULT_NAME.to_string(),
        }
    }
}

impl KernelOptions {
    /// Start a builder from the defaults
    pub fn builder() -> KernelOptionsBuilder {
        KernelOptionsBuilder::new()
    }

    /// Workgroup shape, 1 to 3 axes
    pub fn workgroup(&self) -> &[u32] {
        &self.workgroup
    }

    /// Dispatch shape in workgroups, 1 to 3 axes
    pub fn dispatch(&self) -> &[u32] {
        &self.dispatch
    }

    /// Entry point name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Invocations in one workgroup
    pub fn threads_per_workgroup(&self) -> u64 {
        product(&self.workgroup)
    }

    /// Workgroups in one dispatch
    pub fn num_workgroups(&self) -> u64 {
        product(&self.dispatch)
    }

    /// Invocations in one dispatch
    pub fn total_threads(&self) -> u64 {
        self.threads_per_workgroup() * self.num_workgroups()
    }

    /// Dispatch shape padded to three axes
    pub fn dispatch_xyz(&self) -> (u32, u32, u32) {
        let axis = |i: usize| self.dispatch.get(i).copied().unwrap_or(1);
        (axis(0), axis(1), axis(2))
    }

    /// Check shapes and the entry point name
    pub fn validate(&self) -> Result<()> {
        validate_workgroup(&self.workgroup)?;
        validate_dispatch(&self.dispatch)?;
        validate_identifier("entry point", &self.name)?;
        Ok(())
    }
}

/// Builder for [`KernelOptions`]
#[derive(Debug, Default)]
pub struct KernelOptionsBuilder {
    options: KernelOptions,
}

impl KernelOptionsBuilder {
    /// Builder seeded with [`KernelOptions::default`]
    pub fn new() -> Self {
        Self {
            options: KernelOptions::default(),
        }
    }

    /// Set the workgroup shape
    pub fn workgroup(mut self, workgroup: impl Into<Vec<u32>>) -> Self {
        self.options.workgroup = workgroup.into();
        self
    }

    /// Set the dispatch shape
    pub fn dispatch(mut self, dispatch: impl Into<Vec<u32>>) -> Self {
        self.options.dispatch = dispatch.into();
        self
    }

    /// Set the entry point name
    pub fn name<S: Into<String>>(mut self, name: S) -> Self {
        self.options.name = name.into();
        self
    }

    /// Validate and return the options
    pub fn build(self) -> Result<KernelOptions> {
        self.options.validate()?;
        Ok(self.options)
    }
}

fn product(dims: &[u32]) -> u64 {
    dims.iter().map(|&d| u64::from(d)).product()
}

/// Check a workgroup shape against the lowest-common-denominator compute limits.
pub fn validate_workgroup(workgroup: &[u32]) -> Result<()> {
    if workgroup.is_empty() || workgroup.len() > 3 {
        return Err(Error::config(format!(
            "invalid workgroup {:?}: must have 1 to 3 dimensions",
            workgroup
        )));
    }

    if workgroup.contains(&0) {
        return Err(Error::config(format!(
            "invalid workgroup {:?}: dimensions must be positive",
            workgroup
        )));
    }

    for (axis, (&size, &max)) in workgroup.iter().zip(MAX_WORKGROUP_SIZE.iter()).enumerate() {
        if size > max {
            return Err(Error::config(format!(
                "invalid workgroup {:?}: axis {} is {} but at most {} is allowed",
                workgroup, axis, size, max
            )));
        }
    }

    let total = product(workgroup);
    if total > u64::from(MAX_INVOCATIONS_PER_WORKGROUP) {
        return Err(Error::config(format!(
            "invalid workgroup {:?}: {} invocations exceed the limit of {}",
            workgroup, total, MAX_INVOCATIONS_PER_WORKGROUP
        )));
    }

    Ok(())
}

/// Check a dispatch shape against the per-axis workgroup count limit.
pub fn validate_dispatch(dispatch: &[u32]) -> Result<()> {
    if dispatch.is_empty() || dispatch.len() > 3 {
        return Err(Error::config(format!(
            "invalid dispatch {:?}: must have 1 to 3 dimensions",
            dispatch
        )));
    }

    if let Some(&bad) = dispatch
        .iter()
        .find(|&&d| d == 0 || d > MAX_WORKGROUPS_PER_DIMENSION)
    {
        return Err(Error::config(format!(
            "invalid dispatch {:?}: {} is outside 1..={}",
            dispatch, bad, MAX_WORKGROUPS_PER_DIMENSION
        )));
    }

    Ok(())
}

/// WGSL identifier rules, including the keywords a binding name may not shadow.
pub fn validate_identifier(what: &str, ident: &str) -> Result<()> {
    let mut chars = ident.chars();
    let valid_start = matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_');
    let valid_rest = chars.all(|c| c.is_ascii_alphanumeric() || c == '_');

    if !valid_start || !valid_rest || ident == "_" || ident.starts_with("__") {
        return Err(Error::config(format!(
            "invalid {} name '{}': not a WGSL identifier",
            what, ident
        )));
    }

    if WGSL_KEYWORDS.contains(&ident) {
        return Err(Error::config(format!(
            "invalid {} name '{}': reserved WGSL word",
            what, ident
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let options = KernelOptions::default();
        assert_eq!(options.workgroup(), &[16]);
        assert_eq!(options.dispatch(), &[4]);
        assert_eq!(options.name(), "func");
        assert_eq!(options.total_threads(), 64);
        assert!(options.validate().is_ok());
    }

    #[test]
    fn test_workgroup_limits() {
        assert!(validate_workgroup(&[16]).is_ok());
        assert!(validate_workgroup(&[257]).is_err());
        assert!(validate_workgroup(&[16, 16]).is_ok());
        assert!(validate_workgroup(&[16, 17]).is_err());
        assert!(validate_workgroup(&[8, 8, 65]).is_err());
    }

    #[test]
    fn test_product_limit_applies_to_three_axes() {
        // 8 * 8 * 5 = 320
        let err = validate_workgroup(&[8, 8, 5]).unwrap_err();
        assert!(err.is_config());
        assert!(err.to_string().contains("320"));

        assert!(validate_workgroup(&[4, 1, 64]).is_ok());
        assert!(validate_workgroup(&[2, 2, 64]).is_ok());
        assert!(validate_workgroup(&[4, 4, 16]).is_ok());
        assert!(validate_workgroup(&[2, 2, 65]).is_err());
    }

    #[test]
    fn test_workgroup_shape_errors() {
        assert!(validate_workgroup(&[]).is_err());
        assert!(validate_workgroup(&[1, 1, 1, 1]).is_err());
        assert!(validate_workgroup(&[0]).is_err());
        assert!(validate_workgroup(&[256]).is_ok());
        assert!(validate_workgroup(&[1, 1, 64]).is_ok());
    }

    #[test]
    fn test_builder_rejects_bad_workgroup() {
        let err = KernelOptions::builder()
            .workgroup([16, 17])
            .build()
            .unwrap_err();
        assert!(err.is_config());
        assert!(err.to_string().contains("272"));
    }

    #[test]
    fn test_dispatch_limits() {
        assert!(validate_dispatch(&[4]).is_ok());
        assert!(validate_dispatch(&[2, 2]).is_ok());
        assert!(validate_dispatch(&[0]).is_err());
        assert!(validate_dispatch(&[65_536]).is_err());
        assert!(validate_dispatch(&[]).is_err());
    }

    #[test]
    fn test_derived_counts() {
        let options = KernelOptions::builder()
            .workgroup([4, 4])
            .dispatch([2, 2])
            .build()
            .unwrap();
        assert_eq!(options.threads_per_workgroup(), 16);
        assert_eq!(options.num_workgroups(), 4);
        assert_eq!(options.total_threads(), 64);
        assert_eq!(options.dispatch_xyz(), (2, 2, 1));
    }

    #[test]
    fn test_identifiers() {
        assert!(validate_identifier("argument", "A").is_ok());
        assert!(validate_identifier("argument", "_tmp0").is_ok());
        assert!(validate_identifier("argument", "0a").is_err());
        assert!(validate_identifier("argument", "a-b").is_err());
        assert!(validate_identifier("argument", "_").is_err());
        assert!(validate_identifier("argument", "__x").is_err());
        assert!(validate_identifier("argument", "").is_err());
        assert!(KernelOptions::builder().name("main fn").build().is_err());
    }

    #[test]
    fn test_keywords_are_not_identifiers() {
        for word in ["var", "fn", "let", "loop", "f32", "array"] {
            let err = validate_identifier("argument", word).unwrap_err();
            assert!(err.is_config());
            assert!(err.to_string().contains("reserved"));
        }
        assert!(validate_identifier("argument", "vars").is_ok());
        assert!(KernelOptions::builder().name("loop").build().is_err());
    }
}
