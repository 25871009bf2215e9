//! Per-invocation pass parameters and kernel output-size contracts.

use std::collections::HashMap;

/// Uniform value bound to a pass.
#[derive(Clone, Debug, PartialEq)]
pub enum ParamValue {
    Float(f32),
    Int(i32),
    Bool(bool),
    Vec2([f32; 2]),
    Vec4([f32; 4]),
    /// Column-major 4x4 matrix.
    Mat4([f32; 16]),
    FloatArray(Vec<f32>),
}

/// Named uniforms for one pass invocation. Never retained past the call.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PassParams {
    values: HashMap<&'static str, ParamValue>,
}

impl PassParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, key: &'static str, value: ParamValue) -> &mut Self {
        self.values.insert(key, value);
        self
    }

    pub fn with_f32(mut self, key: &'static str, v: f32) -> Self {
        self.values.insert(key, ParamValue::Float(v));
        self
    }

    pub fn with_i32(mut self, key: &'static str, v: i32) -> Self {
        self.values.insert(key, ParamValue::Int(v));
        self
    }

    pub fn with_bool(mut self, key: &'static str, v: bool) -> Self {
        self.values.insert(key, ParamValue::Bool(v));
        self
    }

    pub fn with_vec2(mut self, key: &'static str, v: [f32; 2]) -> Self {
        self.values.insert(key, ParamValue::Vec2(v));
        self
    }

    pub fn with_vec4(mut self, key: &'static str, v: [f32; 4]) -> Self {
        self.values.insert(key, ParamValue::Vec4(v));
        self
    }

    pub fn with_mat4(mut self, key: &'static str, v: [f32; 16]) -> Self {
        self.values.insert(key, ParamValue::Mat4(v));
        self
    }

    pub fn with_floats(mut self, key: &'static str, v: Vec<f32>) -> Self {
        self.values.insert(key, ParamValue::FloatArray(v));
        self
    }

    pub fn get(&self, key: &str) -> Option<&ParamValue> {
        self.values.get(key)
    }

    pub fn f32_or(&self, key: &str, default: f32) -> f32 {
        match self.values.get(key) {
            Some(ParamValue::Float(v)) => *v,
            Some(ParamValue::Int(v)) => *v as f32,
            _ => default,
        }
    }

    pub fn i32_or(&self, key: &str, default: i32) -> i32 {
        match self.values.get(key) {
            Some(ParamValue::Int(v)) => *v,
            Some(ParamValue::Float(v)) => *v as i32,
            _ => default,
        }
    }

    pub fn bool_or(&self, key: &str, default: bool) -> bool {
        match self.values.get(key) {
            Some(ParamValue::Bool(v)) => *v,
            Some(ParamValue::Int(v)) => *v != 0,
            _ => default,
        }
    }

    pub fn vec2_or(&self, key: &str, default: [f32; 2]) -> [f32; 2] {
        match self.values.get(key) {
            Some(ParamValue::Vec2(v)) => *v,
            _ => default,
        }
    }

    pub fn vec4_or(&self, key: &str, default: [f32; 4]) -> [f32; 4] {
        match self.values.get(key) {
            Some(ParamValue::Vec4(v)) => *v,
            _ => default,
        }
    }

    pub fn mat4_or(&self, key: &str, default: [f32; 16]) -> [f32; 16] {
        match self.values.get(key) {
            Some(ParamValue::Mat4(v)) => *v,
            _ => default,
        }
    }

    pub fn floats(&self, key: &str) -> &[f32] {
        match self.values.get(key) {
            Some(ParamValue::FloatArray(v)) => v,
            _ => &[],
        }
    }
}

/// What destination size a kernel requires.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputSize {
    /// Destination must be exactly the size of source `i`.
    MatchSource(usize),
    /// Destination must be source `i` halved per axis (floor, minimum 1).
    HalfOfSource(usize),
    /// Any size; the kernel resamples.
    Any,
}

pub const IDENTITY_MAT4: [f32; 16] = [
    1.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 1.0,
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn getters_fall_back_to_defaults() {
        let p = PassParams::new().with_f32("threshold", 0.75).with_i32("steps", 8);
        assert_eq!(p.f32_or("threshold", 0.0), 0.75);
        assert_eq!(p.f32_or("steps", 0.0), 8.0);
        assert_eq!(p.f32_or("missing", 2.5), 2.5);
        assert!(!p.bool_or("missing", false));
        assert_eq!(p.mat4_or("proj", IDENTITY_MAT4), IDENTITY_MAT4);
    }
}
