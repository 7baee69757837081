#![forbid(unsafe_code)]

use serde_json::Value;

use crate::SchemaVersion;

pub const CLIENT_CONTRACT_VERSION: SchemaVersion = SchemaVersion(1);

/// Self-reported browser/device facts, normalized from the arbitrary JSON
/// bag the client posts. The schema of that bag is advisory only: no key may
/// be assumed present, so every field here is optional. Serialization always
/// emits every key (absent values become JSON `null`, never omitted), which
/// keeps the hash input shape fixed width.
///
/// The `front_*` prefix separates self-reported identity fields from the
/// server-observed ones on [`crate::edge::EdgeAttributes`].
#[derive(Debug, Clone, PartialEq, Default, serde::Serialize, serde::Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ClientAttributes {
    pub front_user_agent: Option<String>,
    pub front_language: Option<String>,
    pub front_platform: Option<String>,
    pub screen_width: Option<u32>,
    pub screen_height: Option<u32>,
    pub color_depth: Option<u32>,
    pub timezone: Option<String>,
    pub plugins: Option<Vec<String>>,
    pub cookies_enabled: Option<bool>,
    pub local_storage: Option<bool>,
    pub session_storage: Option<bool>,
    pub do_not_track: Option<String>,
    pub hardware_concurrency: Option<u32>,
    pub device_memory: Option<f64>,
    pub canvas: Option<String>,
    pub fonts: Option<Vec<String>>,
    pub webgl_vendor: Option<String>,
    pub webgl_renderer: Option<String>,
    pub webgl_pixel_sum: Option<u64>,
    pub webgl_shader_sum: Option<u64>,
    pub media_audio: Option<Value>,
    pub media_video: Option<Value>,
    pub max_touch_points: Option<u32>,
    pub pointer_precision: Option<bool>,
    pub battery_level: Option<f64>,
    pub battery_charging: Option<bool>,
    pub battery_charging_time: Option<f64>,
    pub battery_discharging_time: Option<f64>,
    pub audio_fingerprint: Option<String>,
}

impl ClientAttributes {
    /// Flattens the advisory nested bag into the fixed-width attribute set.
    /// Unknown keys are ignored; missing or mistyped values become `None`.
    /// Never fails.
    pub fn from_bag(bag: &Value) -> Self {
        let screen = bag.get("screen");
        let webgl = bag.get("webglAdvanced");
        let media = bag.get("mediaCapabilities");
        let touch = bag.get("touchCapabilities");
        let battery = bag.get("battery");
        Self {
            front_user_agent: str_field(Some(bag), "userAgent"),
            front_language: str_field(Some(bag), "language"),
            front_platform: str_field(Some(bag), "platform"),
            screen_width: u32_field(screen, "width"),
            screen_height: u32_field(screen, "height"),
            color_depth: u32_field(screen, "colorDepth"),
            timezone: str_field(Some(bag), "timezone"),
            plugins: name_list_field(Some(bag), "plugins"),
            cookies_enabled: bool_field(Some(bag), "cookiesEnabled"),
            local_storage: bool_field(Some(bag), "localStorage"),
            session_storage: bool_field(Some(bag), "sessionStorage"),
            do_not_track: str_field(Some(bag), "doNotTrack"),
            hardware_concurrency: u32_field(Some(bag), "hardwareConcurrency"),
            device_memory: f64_field(Some(bag), "deviceMemory"),
            canvas: str_field(Some(bag), "canvas"),
            fonts: name_list_field(Some(bag), "fonts"),
            webgl_vendor: str_field(webgl, "vendor"),
            webgl_renderer: str_field(webgl, "renderer"),
            webgl_pixel_sum: u64_field(webgl, "pixelSum"),
            webgl_shader_sum: u64_field(webgl, "shaderSum"),
            media_audio: value_field(media, "audio"),
            media_video: value_field(media, "video"),
            max_touch_points: u32_field(touch, "maxTouchPoints"),
            pointer_precision: bool_field(touch, "pointerPrecision"),
            battery_level: f64_field(battery, "level"),
            battery_charging: bool_field(battery, "charging"),
            battery_charging_time: f64_field(battery, "chargingTime"),
            battery_discharging_time: f64_field(battery, "dischargingTime"),
            audio_fingerprint: str_field(Some(bag), "audioFingerprint"),
        }
    }
}

fn at<'a>(container: Option<&'a Value>, key: &str) -> Option<&'a Value> {
    container.and_then(|v| v.get(key))
}

fn str_field(container: Option<&Value>, key: &str) -> Option<String> {
    at(container, key).and_then(Value::as_str).map(str::to_string)
}

fn bool_field(container: Option<&Value>, key: &str) -> Option<bool> {
    at(container, key).and_then(Value::as_bool)
}

fn u32_field(container: Option<&Value>, key: &str) -> Option<u32> {
    at(container, key)
        .and_then(Value::as_u64)
        .and_then(|v| u32::try_from(v).ok())
}

fn u64_field(container: Option<&Value>, key: &str) -> Option<u64> {
    at(container, key).and_then(Value::as_u64)
}

fn f64_field(container: Option<&Value>, key: &str) -> Option<f64> {
    at(container, key).and_then(Value::as_f64)
}

fn name_list_field(container: Option<&Value>, key: &str) -> Option<Vec<String>> {
    let entries = at(container, key)?.as_array()?;
    Some(
        entries
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect(),
    )
}

fn value_field(container: Option<&Value>, key: &str) -> Option<Value> {
    at(container, key).filter(|v| !v.is_null()).cloned()
}
