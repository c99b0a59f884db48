//! Application state tree sent to the UI.
//!
//! Field names serialize in camelCase to match the web client.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AppState {
    pub sessions: Vec<SessionInfo>,
    pub session: SessionInfo,
    pub transport: TransportState,
    pub active_mode: ActiveMode,
    #[serde(rename = "activeFX")]
    pub active_fx: ActiveFx,
    pub mic: MicState,
    pub looper: LooperState,
    pub slots: Vec<SlotState>,
    pub riff_history: Vec<RiffHistoryEntry>,
    pub settings: Settings,
    pub system: SystemStats,
    /// Reserved for client-side view state.
    pub ui: Map<String, Value>,
}

impl AppState {
    pub fn to_value(&self) -> crate::Result<Value> {
        Ok(serde_json::to_value(self)?)
    }

    pub fn from_value(value: Value) -> crate::Result<Self> {
        Ok(serde_json::from_value(value)?)
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SessionInfo {
    pub id: String,
    pub name: String,
    pub emoji: String,
    /// Milliseconds since the Unix epoch.
    pub created_at: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TransportState {
    pub bpm: f64,
    pub is_playing: bool,
    /// Position within the current bar, 0 to 1.
    pub bar_phase: f64,
    pub loop_length_bars: u32,
    pub metronome_enabled: bool,
    pub quantise_enabled: bool,
    pub root_note: i32,
    pub scale: String,
}

impl Default for TransportState {
    fn default() -> Self {
        Self {
            bpm: 120.0,
            is_playing: false,
            bar_phase: 0.0,
            loop_length_bars: 4,
            metronome_enabled: false,
            quantise_enabled: false,
            root_note: 0,
            scale: "chromatic".into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ActiveMode {
    pub category: String,
    pub preset_id: String,
    pub preset_name: String,
    pub is_fx_mode: bool,
    pub selected_source_slots: Vec<u32>,
}

impl Default for ActiveMode {
    fn default() -> Self {
        Self {
            category: "drums".into(),
            preset_id: "synthetic".into(),
            preset_name: "Synthetic".into(),
            is_fx_mode: false,
            selected_source_slots: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct XyPosition {
    pub x: f32,
    pub y: f32,
}

impl Default for XyPosition {
    fn default() -> Self {
        Self { x: 0.5, y: 0.5 }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ActiveFx {
    pub effect_id: String,
    pub effect_name: String,
    pub xy_position: XyPosition,
    pub is_active: bool,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MicState {
    /// dB.
    pub input_gain: f32,
    /// Peak, 0 to 1.
    pub input_level: f32,
    pub monitor_input: bool,
    pub monitor_until_looped: bool,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LooperState {
    /// Peak of the last block pushed into the retrospective buffer.
    pub input_level: f32,
    /// Peak-per-bucket overview of the retrospective buffer.
    pub waveform_data: Vec<f32>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PluginInstance {
    pub id: String,
    pub plugin_id: String,
    pub manufacturer: String,
    pub name: String,
    pub bypass: bool,
    /// Opaque base64 plugin state. Not broadcast.
    #[serde(skip_serializing)]
    pub state: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SlotPlayState {
    #[default]
    Empty,
    Playing,
    Muted,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SlotState {
    pub id: String,
    pub state: SlotPlayState,
    pub volume: f32,
    pub muted: bool,
    pub riff_id: String,
    pub name: String,
    pub instrument_category: String,
    pub preset_id: String,
    pub user_id: String,
    pub plugin_chain: Vec<PluginInstance>,
    pub loop_length_bars: u32,
    pub original_bpm: f64,
    /// Omitted while zero.
    #[serde(skip_serializing_if = "is_zero")]
    pub last_error: i32,
}

fn is_zero(value: &i32) -> bool {
    *value == 0
}

impl Default for SlotState {
    fn default() -> Self {
        Self {
            id: String::new(),
            state: SlotPlayState::Empty,
            volume: 1.0,
            muted: false,
            riff_id: String::new(),
            name: String::new(),
            instrument_category: "drums".into(),
            preset_id: "mic_input".into(),
            user_id: "local".into(),
            plugin_chain: Vec::new(),
            loop_length_bars: 4,
            original_bpm: 120.0,
            last_error: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RiffHistoryEntry {
    pub id: String,
    /// Milliseconds since the Unix epoch.
    pub timestamp: i64,
    pub name: String,
    pub layers: u32,
    pub colors: Vec<String>,
    pub user_id: String,
}

impl Default for RiffHistoryEntry {
    fn default() -> Self {
        Self {
            id: String::new(),
            timestamp: 0,
            name: String::new(),
            layers: 0,
            colors: Vec::new(),
            user_id: "local".into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    pub riff_swap_mode: String,
    pub buffer_size: u32,
    pub sample_rate: f64,
    pub storage_location: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            riff_swap_mode: "instant".into(),
            buffer_size: 512,
            sample_rate: 48000.0,
            storage_location: String::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SystemStats {
    pub cpu_load: f32,
    /// Disk writer ring fill, 0 to 100.
    pub disk_buffer_usage: f32,
    #[serde(rename = "memoryUsageMB")]
    pub memory_usage_mb: f32,
    pub active_plugin_hosts: u32,
}
