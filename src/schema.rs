use std::collections::HashMap;

use anyhow::{Result, anyhow, bail};
use serde::Deserialize;

use crate::{
    color::parse_color,
    dsl::{EffectNode, FrameDSL, parse_bool, parse_f32, parse_i64, parse_vec},
};

const DEFAULT_EFFECT_SCHEME_JSON: &str = include_str!("../assets/effect-scheme.json");

#[derive(Debug, Clone, Deserialize)]
pub struct EffectScheme {
    pub version: String,
    pub effects: HashMap<String, EffectTypeScheme>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct EffectTypeScheme {
    #[serde(default)]
    pub params: HashMap<String, ParamScheme>,
}

impl EffectTypeScheme {
    pub fn default_params(&self) -> HashMap<String, serde_json::Value> {
        self.params
            .iter()
            .filter_map(|(k, p)| p.default.clone().map(|v| (k.clone(), v)))
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamType {
    Float,
    Int,
    Bool,
    String,
    Color,
    Vec2,
    Mat4,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ParamScheme {
    #[serde(rename = "type")]
    pub ty: ParamType,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub default: Option<serde_json::Value>,
    /// Allowed values for string params, matched case-insensitively.
    #[serde(default)]
    pub values: Vec<String>,
}

pub fn load_default_scheme() -> Result<EffectScheme> {
    serde_json::from_str(DEFAULT_EFFECT_SCHEME_JSON)
        .map_err(|e| anyhow!("failed to parse assets/effect-scheme.json: {e}"))
}

pub fn validate_frame(frame: &FrameDSL) -> Result<()> {
    let scheme = load_default_scheme()?;
    validate_frame_against(frame, &scheme)
}

pub fn validate_frame_against(frame: &FrameDSL, scheme: &EffectScheme) -> Result<()> {
    let mut errors: Vec<String> = Vec::new();

    if let Some(projection) = frame.camera.as_ref().and_then(|c| c.projection.as_ref()) {
        if projection.len() != 16 {
            errors.push(format!(
                "camera.projection must have 16 elements, got {}",
                projection.len()
            ));
        }
    }

    let mut seen: HashMap<&str, usize> = HashMap::new();
    for (i, e) in frame.effects.iter().enumerate() {
        if let Some(prev) = seen.insert(e.id.as_str(), i) {
            errors.push(format!(
                "duplicate effect id '{}' (effects #{prev} and #{i})",
                e.id
            ));
        }

        let Some(effect_scheme) = scheme.effects.get(&e.effect_type) else {
            errors.push(format!(
                "unknown effect type '{}' at effect '{}'",
                e.effect_type, e.id
            ));
            continue;
        };

        for (param_name, param_scheme) in &effect_scheme.params {
            if param_scheme.required && !e.params.contains_key(param_name) {
                errors.push(format!(
                    "missing required param '{}.{}' (type {:?})",
                    e.id, param_name, param_scheme.ty
                ));
            }
        }

        for (k, v) in &e.params {
            let Some(param_scheme) = effect_scheme.params.get(k) else {
                // Unknown params are ignored.
                continue;
            };
            if let Err(msg) = validate_param_value(e, k, v, param_scheme) {
                errors.push(msg);
            }
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        bail!(
            "frame failed scheme validation ({} error(s)):\n- {}",
            errors.len(),
            errors.join("\n- ")
        )
    }
}

fn validate_param_value(
    effect: &EffectNode,
    key: &str,
    value: &serde_json::Value,
    scheme: &ParamScheme,
) -> std::result::Result<(), String> {
    let ok = match scheme.ty {
        ParamType::Float => parse_f32(&effect.params, key).is_some(),
        ParamType::Int => parse_i64(&effect.params, key).is_some(),
        ParamType::Bool => parse_bool(&effect.params, key).is_some(),
        ParamType::String => match value.as_str() {
            Some(s) if !scheme.values.is_empty() => {
                if !scheme.values.iter().any(|v| v.eq_ignore_ascii_case(s)) {
                    return Err(format!(
                        "invalid value for '{}.{}': '{s}' (expected one of {})",
                        effect.id,
                        key,
                        scheme.values.join(", ")
                    ));
                }
                true
            }
            Some(_) => true,
            None => false,
        },
        ParamType::Color => parse_color(value).is_ok(),
        ParamType::Vec2 => parse_vec::<2>(&effect.params, key).is_some(),
        ParamType::Mat4 => parse_vec::<16>(&effect.params, key).is_some(),
    };

    if ok {
        Ok(())
    } else {
        Err(format!(
            "invalid param type for '{}.{}': expected {:?}, got {}",
            effect.id, key, scheme.ty, value
        ))
    }
}
