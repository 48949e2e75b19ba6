//! Element types for buffers and kernel arguments.

use std::fmt;

/// Scalar element type of a buffer or a kernel argument
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DType {
    /// 32-bit float, the only type buffers can be allocated with
    F32,
    /// 16-bit float
    F16,
    /// 32-bit signed integer
    I32,
    /// 32-bit unsigned integer
    U32,
}

impl DType {
    /// Size of a single element in bytes
    pub fn size_bytes(&self) -> usize {
        match self {
            DType::F32 | DType::I32 | DType::U32 => 4,
            DType::F16 => 2,
        }
    }

    /// WGSL spelling of the scalar type
    pub fn wgsl_name(&self) -> &'static str {
        match self {
            DType::F32 => "f32",
            DType::F16 => "f16",
            DType::I32 => "i32",
            DType::U32 => "u32",
        }
    }

    /// Whether host-mapped views of this type are supported by [`Memory`](super::Memory)
    pub fn is_host_supported(&self) -> bool {
        matches!(self, DType::F32)
    }

    /// Scalar type of a WGSL element type such as `f32`, `vec4<f32>` or `mat4x4<f32>`.
    pub fn from_wgsl(ty: &str) -> Option<DType> {
        let ty = ty.trim();
        let scalar = match (ty.find('<'), ty.strip_suffix('>')) {
            (Some(open), Some(inner)) => {
                let head = &ty[..open];
                if !(head.starts_with("vec") || head.starts_with("mat")) {
                    return None;
                }
                inner[open + 1..].trim()
            }
            (None, None) => ty,
            _ => return None,
        };

        match scalar {
            "f32" => Some(DType::F32),
            "f16" => Some(DType::F16),
            "i32" => Some(DType::I32),
            "u32" => Some(DType::U32),
            _ => None,
        }
    }
}

impl Default for DType {
    fn default() -> Self {
        DType::F32
    }
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.wgsl_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sizes() {
        assert_eq!(DType::F32.size_bytes(), 4);
        assert_eq!(DType::F16.size_bytes(), 2);
        assert_eq!(DType::U32.size_bytes(), 4);
    }

    #[test]
    fn test_host_support() {
        assert!(DType::F32.is_host_supported());
        assert!(!DType::F16.is_host_supported());
        assert!(!DType::U32.is_host_supported());
    }

    #[test]
    fn test_from_wgsl() {
        assert_eq!(DType::from_wgsl("f32"), Some(DType::F32));
        assert_eq!(DType::from_wgsl(" u32 "), Some(DType::U32));
        assert_eq!(DType::from_wgsl("vec4<f32>"), Some(DType::F32));
        assert_eq!(DType::from_wgsl("vec2<i32>"), Some(DType::I32));
        assert_eq!(DType::from_wgsl("mat4x4<f32>"), Some(DType::F32));
        assert_eq!(DType::from_wgsl("atomic<u32>"), None);
        assert_eq!(DType::from_wgsl("vec4<f32"), None);
        assert_eq!(DType::from_wgsl("bool"), None);
    }
}
