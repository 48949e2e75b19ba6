//! WGSL generation for templated kernels.
//!
//! The caller writes only the body of the entry point; binding declarations
//! and the invocation-index preamble are generated here. Generation is a pure
//! function of validated options, the argument list and the template output.

use super::dtype::DType;
use super::options::{validate_identifier, KernelOptions};
use crate::error::{Error, Result};
use std::collections::HashSet;

/// Identifiers the generated entry point declares itself.
pub const RESERVED_IDENTIFIERS: [&str; 7] = [
    "workgroup_id",
    "local_invocation_id",
    "global_invocation_id",
    "local_invocation_index",
    "num_workgroups",
    "workgroup_invocation_index",
    "global_invocation_index",
];

/// One kernel argument: a read-write storage array named `name` of element type `ty`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KernelArg {
    /// Binding name, a WGSL identifier
    pub name: String,
    /// WGSL element type, e.g. `f32` or `vec4<f32>`
    pub ty: String,
}

impl KernelArg {
    /// Argument `name` with WGSL element type `ty`
    pub fn new(name: impl Into<String>, ty: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ty: ty.into(),
        }
    }

    /// Shorthand for an `array<f32>` argument
    pub fn f32(name: impl Into<String>) -> Self {
        Self::new(name, DType::F32.wgsl_name())
    }

    /// Scalar type the argument's elements are built from
    pub fn dtype(&self) -> Option<DType> {
        DType::from_wgsl(&self.ty)
    }
}

/// Values a kernel template may interpolate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KernelContext {
    /// Invocations per dispatch, the stride of a grid-stride loop
    pub threads: u64,
    /// Invocations per workgroup
    pub threads_per_workgroup: u64,
    /// Workgroups per dispatch
    pub num_workgroups: u64,
    /// Argument names in binding order
    pub args: Vec<String>,
}

impl KernelContext {
    /// Context for `args` launched with `options`
    pub fn new(options: &KernelOptions, args: &[KernelArg]) -> Self {
        Self {
            threads: options.total_threads(),
            threads_per_workgroup: options.threads_per_workgroup(),
            num_workgroups: options.num_workgroups(),
            args: args.iter().map(|a| a.name.clone()).collect(),
        }
    }

    /// Name of the argument bound at `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index` is out of range; templates are written against a
    /// fixed argument list.
    pub fn arg(&self, index: usize) -> &str {
        &self.args[index]
    }
}

/// Generated kernel text together with the context it was generated from.
#[derive(Debug, Clone)]
pub struct KernelSource {
    /// Complete WGSL module
    pub code: String,
    /// Context the template was called with
    pub context: KernelContext,
}

impl KernelSource {
    /// Validate `options` and `args`, run `template` and assemble the module.
    pub fn generate<F>(args: &[KernelArg], options: &KernelOptions, template: F) -> Result<Self>
    where
        F: FnOnce(&KernelContext) -> String,
    {
        options.validate()?;
        validate_args(args, options)?;

        let context = KernelContext::new(options, args);
        let body = template(&context);
        let code = assemble(args, options, &context, &body);

        Ok(Self { code, context })
    }
}

/// Check argument names and types before anything is generated.
pub fn validate_args(args: &[KernelArg], options: &KernelOptions) -> Result<()> {
    let mut seen = HashSet::with_capacity(args.len());

    for arg in args {
        validate_identifier("argument", &arg.name)?;

        if RESERVED_IDENTIFIERS.contains(&arg.name.as_str()) || arg.name == options.name() {
            return Err(Error::config(format!(
                "argument name '{}' collides with a generated identifier",
                arg.name
            )));
        }

        if !seen.insert(arg.name.as_str()) {
            return Err(Error::config(format!(
                "duplicate argument name '{}'",
                arg.name
            )));
        }

        match arg.dtype() {
            None => {
                return Err(Error::config(format!(
                    "argument '{}' has unsupported element type '{}'",
                    arg.name, arg.ty
                )));
            }
            // Buffers are allocated with 4-byte elements; narrower scalars could never be bound.
            Some(dtype) if dtype.size_bytes() != DType::F32.size_bytes() => {
                return Err(Error::config(format!(
                    "argument '{}' has {}-byte elements of type '{}', buffers hold {}-byte elements",
                    arg.name,
                    dtype.size_bytes(),
                    arg.ty,
                    DType::F32.size_bytes()
                )));
            }
            Some(_) => {}
        }
    }

    Ok(())
}

fn assemble(args: &[KernelArg], options: &KernelOptions, context: &KernelContext, body: &str) -> String {
    let mut code = String::with_capacity(1024 + body.len());

    for (binding, arg) in args.iter().enumerate() {
        code.push_str(&format!(
            "@group(0) @binding({}) var<storage, read_write> {}: array<{}>;\n",
            binding, arg.name, arg.ty
        ));
    }

    let workgroup = options
        .workgroup()
        .iter()
        .map(u32::to_string)
        .collect::<Vec<_>>()
        .join(", ");

    code.push_str(&format!(
        "
@compute @workgroup_size({workgroup})
fn {name}(
    @builtin(workgroup_id) workgroup_id: vec3<u32>,
    @builtin(local_invocation_id) local_invocation_id: vec3<u32>,
    @builtin(global_invocation_id) global_invocation_id: vec3<u32>,
    @builtin(local_invocation_index) local_invocation_index: u32,
    @builtin(num_workgroups) num_workgroups: vec3<u32>
) {{
    let workgroup_invocation_index: u32 = workgroup_id.x + workgroup_id.y * num_workgroups.x + workgroup_id.z * num_workgroups.x * num_workgroups.y;
    let global_invocation_index: u32 = {tpw}u * workgroup_invocation_index + local_invocation_index;

{body}
}}
",
        workgroup = workgroup,
        name = options.name(),
        tpw = context.threads_per_workgroup,
        body = body,
    ));

    code
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doubling_args() -> Vec<KernelArg> {
        vec![KernelArg::f32("A"), KernelArg::f32("B")]
    }

    #[test]
    fn test_context_values() {
        let options = KernelOptions::builder()
            .workgroup([256])
            .dispatch([4])
            .build()
            .unwrap();
        let mut seen = None;
        KernelSource::generate(&doubling_args(), &options, |ctx| {
            seen = Some(ctx.clone());
            String::new()
        })
        .unwrap();

        let ctx = seen.unwrap();
        assert_eq!(ctx.threads, 1024);
        assert_eq!(ctx.threads_per_workgroup, 256);
        assert_eq!(ctx.num_workgroups, 4);
        assert_eq!(ctx.args, vec!["A".to_string(), "B".to_string()]);
        assert_eq!(ctx.arg(1), "B");
    }

    #[test]
    fn test_bindings_in_argument_order() {
        let args = vec![
            KernelArg::f32("x"),
            KernelArg::new("y", "vec4<f32>"),
            KernelArg::new("n", "u32"),
        ];
        let source =
            KernelSource::generate(&args, &KernelOptions::default(), |_| String::new()).unwrap();

        assert!(source
            .code
            .contains("@group(0) @binding(0) var<storage, read_write> x: array<f32>;"));
        assert!(source
            .code
            .contains("@group(0) @binding(1) var<storage, read_write> y: array<vec4<f32>>;"));
        assert!(source
            .code
            .contains("@group(0) @binding(2) var<storage, read_write> n: array<u32>;"));
    }

    #[test]
    fn test_entry_point_preamble() {
        let options = KernelOptions::builder()
            .workgroup([4, 4])
            .dispatch([2, 2])
            .name("matmul")
            .build()
            .unwrap();
        let source = KernelSource::generate(&doubling_args(), &options, |_| {
            "    B[global_invocation_index] = A[global_invocation_index];".to_string()
        })
        .unwrap();

        assert!(source.code.contains("@compute @workgroup_size(4, 4)"));
        assert!(source.code.contains("fn matmul("));
        assert!(source
            .code
            .contains("@builtin(local_invocation_index) local_invocation_index: u32"));
        assert!(source
            .code
            .contains("let global_invocation_index: u32 = 16u * workgroup_invocation_index"));
        assert!(source
            .code
            .contains("B[global_invocation_index] = A[global_invocation_index];"));
    }

    #[test]
    fn test_template_not_called_on_invalid_options() {
        let mut called = false;
        let result = KernelSource::generate(&doubling_args(), &KernelOptions::default(), |_| {
            called = true;
            String::new()
        });
        assert!(result.is_ok());
        assert!(called);

        let bad_args = vec![KernelArg::f32("A"), KernelArg::f32("A")];
        let mut called = false;
        let err = KernelSource::generate(&bad_args, &KernelOptions::default(), |_| {
            called = true;
            String::new()
        })
        .unwrap_err();
        assert!(err.is_config());
        assert!(!called);
    }

    #[test]
    fn test_argument_validation() {
        let options = KernelOptions::default();
        assert!(validate_args(&[KernelArg::f32("global_invocation_index")], &options).is_err());
        assert!(validate_args(&[KernelArg::f32("func")], &options).is_err());
        assert!(validate_args(&[KernelArg::new("A", "bool")], &options).is_err());
        assert!(validate_args(&[KernelArg::f32("1A")], &options).is_err());
        assert!(validate_args(&[], &options).is_ok());
    }

    #[test]
    fn test_element_types_must_be_bindable() {
        let options = KernelOptions::default();
        assert!(validate_args(&[KernelArg::new("n", "u32")], &options).is_ok());
        assert!(validate_args(&[KernelArg::new("v", "vec2<i32>")], &options).is_ok());

        let err = validate_args(&[KernelArg::new("h", "f16")], &options).unwrap_err();
        assert!(err.is_config());
        assert!(err.to_string().contains("2-byte"));
        assert!(validate_args(&[KernelArg::new("h", "vec4<f16>")], &options).is_err());
    }

    #[test]
    fn test_keyword_argument_rejected_before_template() {
        let mut called = false;
        let err = KernelSource::generate(
            &[KernelArg::f32("A"), KernelArg::f32("loop")],
            &KernelOptions::default(),
            |_| {
                called = true;
                String::new()
            },
        )
        .unwrap_err();
        assert!(err.is_config());
        assert!(!called);
    }
}
