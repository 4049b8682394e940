//! Domain-tuned models selected by field name.
//!
//! The dispatch tables below encode what mesh telemetry actually looks like:
//! battery levels sit near full, hop counts decay from zero, channel indices
//! are almost always zero, a handful of enums nearly always hold one value.
//! Shapes are keyed by field name; the cache key adds the enclosing message
//! type so a name can resolve differently across messages. Tables are static
//! and immutable, shared freely across invocations; the per-record cache in
//! [`ContextModels`] is not.

use std::collections::HashMap;
use std::sync::{Arc, LazyLock};

use crate::builder::ModelSet;
use crate::model::Model;
use crate::path;
use crate::schema::{EnumDescriptor, FieldDescriptor};

/// Port number that marks plain text packets.
pub const TEXT_MESSAGE_APP: i32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Shape {
    /// No usable bias; identifiers, coordinates, timestamps.
    Uniform,
    /// Small magnitudes dominate the varint bytes.
    LowVarint,
    /// Battery percentage, 0-100 with a peak at the full end (101 = plugged).
    Battery,
    /// Signal measurements; sign-extended varints put mass mid-band.
    MidBand,
    /// Hop counts 0-7, monotonically decaying.
    Hops,
    /// Channel indices, overwhelmingly zero.
    ZeroSpike,
    /// Small-range percentages with a low-end peak.
    Percent,
    /// Packet priority, modes at the few declared levels.
    Priority,
}

/// Field names with a known statistical shape. `priority` is handled
/// separately because its shape only applies inside `MeshPacket`.
static SHAPES: LazyLock<HashMap<&'static str, Shape>> = LazyLock::new(|| {
    use Shape::*;

    let mut table = HashMap::new();
    let entries: &[(&str, Shape)] = &[
        // coordinates and identifiers carry no exploitable bias
        ("latitude_i", Uniform),
        ("longitude_i", Uniform),
        ("from", Uniform),
        ("to", Uniform),
        ("num", Uniform),
        ("dest", Uniform),
        ("source", Uniform),
        ("id", Uniform),
        ("request_id", Uniform),
        ("reply_id", Uniform),
        ("last_sent_by_id", Uniform),
        ("macaddr", Uniform),
        ("public_key", Uniform),
        ("seq_number", Uniform),
        ("precision_bits", Uniform),
        // timestamps are effectively random within their band
        ("time", Uniform),
        ("timestamp", Uniform),
        ("rx_time", Uniform),
        ("last_heard", Uniform),
        ("next_update", Uniform),
        ("timestamp_millis_adjust", Uniform),
        // small-magnitude integer measurements
        ("altitude", LowVarint),
        ("altitude_hae", LowVarint),
        ("altitude_geoidal_separation", LowVarint),
        ("ground_speed", LowVarint),
        ("ground_track", LowVarint),
        ("gps_accuracy", LowVarint),
        ("pdop", LowVarint),
        ("hdop", LowVarint),
        ("vdop", LowVarint),
        ("sats_in_view", LowVarint),
        ("fix_quality", LowVarint),
        ("fix_type", LowVarint),
        ("uptime_seconds", LowVarint),
        ("distance", LowVarint),
        ("wind_direction", LowVarint),
        ("num_packets_tx", LowVarint),
        ("num_packets_rx", LowVarint),
        ("num_packets_rx_bad", LowVarint),
        ("num_online_nodes", LowVarint),
        ("num_total_nodes", LowVarint),
        ("emoji", ZeroSpike),
        // float-typed measurements: the tuned shapes would misfit the IEEE
        // byte distribution, so these stay uniform on purpose
        ("voltage", Uniform),
        ("current", Uniform),
        ("temperature", Uniform),
        ("barometric_pressure", Uniform),
        ("gas_resistance", Uniform),
        ("wind_speed", Uniform),
        ("wind_gust", Uniform),
        ("wind_lull", Uniform),
        ("radiation", Uniform),
        ("weight", Uniform),
        ("rx_snr", Uniform),
        ("snr", Uniform),
        ("channel_utilization", Uniform),
        ("air_util_tx", Uniform),
        // battery and link quality
        ("battery_level", Battery),
        ("rx_rssi", MidBand),
        // routing
        ("hop_limit", Hops),
        ("hop_start", Hops),
        ("hops_away", Hops),
        ("next_hop", Uniform),
        ("relay_node", Uniform),
        ("channel", ZeroSpike),
        ("channel_index", ZeroSpike),
        // integer environment percentages
        ("humidity", Percent),
        ("relative_humidity", Percent),
        ("iaq", Percent),
        ("soil_moisture", Percent),
    ];
    for &(name, shape) in entries {
        table.insert(name, shape);
    }
    table
});

fn shape_for(message_type: &str, name: &str) -> Option<Shape> {
    if name == "priority" {
        return (message_type == "MeshPacket").then_some(Shape::Priority);
    }
    SHAPES.get(name).copied()
}

fn weights_for(shape: Shape) -> [u32; 256] {
    let mut weights = [1u32; 256];
    match shape {
        Shape::Uniform => {}
        Shape::LowVarint => {
            for (byte, weight) in weights.iter_mut().enumerate() {
                *weight = match byte {
                    0..=63 => 40,
                    64..=127 => 12,
                    _ => 3,
                };
            }
        }
        Shape::Battery => {
            for (byte, weight) in weights.iter_mut().enumerate() {
                *weight = match byte {
                    0..=49 => 10,
                    50..=100 => 40,
                    101 => 20,
                    _ => 1,
                };
            }
        }
        Shape::MidBand => {
            for (byte, weight) in weights.iter_mut().enumerate() {
                let distance = (byte as i32 - 128).abs();
                *weight = (70 - distance / 2).max(2) as u32;
            }
        }
        Shape::Hops => {
            let decay = [200u32, 120, 70, 40, 25, 15, 10, 6];
            for (byte, &weight) in decay.iter().enumerate() {
                weights[byte] = weight;
            }
        }
        Shape::ZeroSpike => {
            weights[0] = 500;
            for weight in &mut weights[1..8] {
                *weight = 30;
            }
        }
        Shape::Percent => {
            for (byte, weight) in weights.iter_mut().enumerate() {
                *weight = match byte {
                    0..=30 => 30,
                    31..=100 => 8,
                    _ => 1,
                };
            }
        }
        Shape::Priority => {
            weights[10] = 200;
            weights[64] = 200;
            weights[70] = 200;
            weights[120] = 200;
            for weight in weights.iter_mut().filter(|w| **w == 1) {
                *weight = 2;
            }
        }
    }
    weights
}

static SHAPE_MODELS: LazyLock<HashMap<u8, Arc<Model>>> = LazyLock::new(|| {
    let shapes = [
        Shape::Uniform,
        Shape::LowVarint,
        Shape::Battery,
        Shape::MidBand,
        Shape::Hops,
        Shape::ZeroSpike,
        Shape::Percent,
        Shape::Priority,
    ];
    shapes
        .into_iter()
        .map(|shape| (shape as u8, Model::shared(&weights_for(shape))))
        .collect()
});

fn model_for(shape: Shape) -> Arc<Model> {
    SHAPE_MODELS[&(shape as u8)].clone()
}

/// Biased two-symbol models for named boolean fields. Weight index 0 is
/// `false`.
fn bool_weights(name: &str) -> [u32; 2] {
    match name {
        "want_ack" | "via_mqtt" | "pki_encrypted" | "want_response" => [950, 50],
        "is_licensed" | "is_favorite" | "is_ignored" | "retained" | "rebooted" | "disconnect"
        | "is_key_manually_verified" | "is_unmessagable" => [900, 100],
        // configuration toggles that default off
        "is_managed" | "serial_enabled" | "debug_log_enabled" | "fixed_position"
        | "is_power_saving" | "is_always_powered" | "wifi_enabled" | "eth_enabled"
        | "override_duty_cycle" | "sx126x_rx_boosted_gain" | "position_broadcast_smart_enabled"
        | "double_tap_as_button_press" | "disable_triple_click" | "led_heartbeat_disabled" => {
            [800, 200]
        }
        // display toggles users tend to leave on
        "compass_north_top" | "flip_screen" | "heading_bold" | "wake_on_tap_or_motion" => {
            [400, 600]
        }
        "use_preset" => [300, 700],
        "tx_enabled" => [200, 800],
        _ => [600, 400],
    }
}

static BOOL_MODELS: LazyLock<HashMap<[u32; 2], Arc<Model>>> = LazyLock::new(|| {
    let classes = [
        [950, 50],
        [900, 100],
        [800, 200],
        [400, 600],
        [300, 700],
        [200, 800],
        [600, 400],
    ];
    classes
        .into_iter()
        .map(|weights| (weights, Model::shared(&weights)))
        .collect()
});

/// Predicted number for commonly-fixed enums, by field name.
///
/// The walker writes a 1-bit match flag first; the full enum index follows
/// only on a miss.
#[must_use]
pub fn enum_prediction(name: &str) -> Option<i32> {
    match name {
        "portnum" => Some(TEXT_MESSAGE_APP),
        "priority" => Some(64),
        "role" => Some(0),
        "delayed" => Some(0),
        "location_source" => Some(0),
        "altitude_source" => Some(0),
        "error_reason" => Some(0),
        "rebroadcast_mode" => Some(0),
        "modem_preset" => Some(0),
        _ => None,
    }
}

/// First byte of a varint: zero and other small terminal values dominate.
static VARINT_FIRST: LazyLock<Arc<Model>> = LazyLock::new(|| {
    let mut weights = [6u32; 256];
    for (byte, weight) in weights.iter_mut().enumerate() {
        *weight = match byte {
            0 => 300,
            1..=7 => 90,
            8..=15 => 40,
            16..=63 => 15,
            64..=127 => 8,
            _ => 6,
        };
    }
    Model::shared(&weights)
});

/// Continuation bytes: near-flat, with extra mass on the `0xff` runs and
/// `0x01` tails that sign-extended negatives produce.
static VARINT_CONTINUATION: LazyLock<Arc<Model>> = LazyLock::new(|| {
    let mut weights = [8u32; 256];
    for (byte, weight) in weights.iter_mut().enumerate() {
        *weight = match byte {
            0 => 15,
            1 => 30,
            2..=15 => 15,
            0xff => 60,
            _ => 8,
        };
    }
    Model::shared(&weights)
});

/// Model source with the domain dispatch overlay.
///
/// Cache keys include the current message type, so `priority` inside a
/// `MeshPacket` and `priority` elsewhere resolve independently.
pub struct ContextModels {
    bool_model: Arc<Model>,
    byte_model: Arc<Model>,
    cache: HashMap<String, Arc<Model>>,
}

impl ContextModels {
    #[must_use]
    pub fn new() -> Self {
        Self {
            bool_model: Arc::new(Model::bit()),
            byte_model: Arc::new(Model::uniform(256)),
            cache: HashMap::new(),
        }
    }

    fn context_key(message_type: &str, fpath: &str) -> String {
        format!("{message_type}:{fpath}")
    }
}

impl Default for ContextModels {
    fn default() -> Self {
        Self::new()
    }
}

impl ModelSet for ContextModels {
    fn bool_model(&self) -> Arc<Model> {
        self.bool_model.clone()
    }

    fn byte_model(&self) -> Arc<Model> {
        self.byte_model.clone()
    }

    fn field_model(
        &mut self,
        message_type: &str,
        fpath: &str,
        field: &FieldDescriptor,
    ) -> Arc<Model> {
        let key = Self::context_key(message_type, fpath);
        if let Some(model) = self.cache.get(&key) {
            return model.clone();
        }
        let model = match shape_for(message_type, &field.name) {
            Some(shape) => model_for(shape),
            None => self.byte_model.clone(),
        };
        self.cache.insert(key, model.clone());
        model
    }

    fn enum_model(
        &mut self,
        message_type: &str,
        fpath: &str,
        enumeration: &EnumDescriptor,
    ) -> Arc<Model> {
        self.cache
            .entry(Self::context_key(message_type, fpath))
            .or_insert_with(|| Arc::new(Model::uniform(enumeration.values().len())))
            .clone()
    }

    fn length_model(&mut self, message_type: &str, lpath: &str) -> Arc<Model> {
        let fallback = &self.byte_model;
        self.cache
            .entry(Self::context_key(message_type, lpath))
            .or_insert_with(|| fallback.clone())
            .clone()
    }

    fn field_bool_model(&mut self, name: &str) -> Arc<Model> {
        BOOL_MODELS[&bool_weights(name)].clone()
    }

    fn presence_model(&mut self, name: &str) -> Arc<Model> {
        BOOL_MODELS[&bool_weights(&path::presence(name))].clone()
    }

    fn varint_model(&self, first: bool) -> Arc<Model> {
        if first {
            VARINT_FIRST.clone()
        } else {
            VARINT_CONTINUATION.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Frequencies;
    use crate::schema::Kind;

    #[test]
    fn test_priority_is_meshpacket_only() {
        assert_eq!(Some(Shape::Priority), shape_for("MeshPacket", "priority"));
        assert_eq!(None, shape_for("Channel", "priority"));
    }

    #[test]
    fn test_context_key_discriminates_messages() {
        let mut models = ContextModels::new();
        let field = FieldDescriptor::scalar(1, "priority", Kind::UInt32);
        let tuned = models.field_model("MeshPacket", "priority", &field);
        let plain = models.field_model("Channel", "priority", &field);
        let (low, high) = tuned.interval(64);
        assert_eq!(200, high - low);
        assert_eq!(256, plain.total());
    }

    #[test]
    fn test_bool_classes() {
        assert_eq!([950, 50], bool_weights("want_ack"));
        assert_eq!([900, 100], bool_weights("is_favorite"));
        assert_eq!([800, 200], bool_weights("fixed_position"));
        assert_eq!([400, 600], bool_weights("flip_screen"));
        assert_eq!([300, 700], bool_weights("use_preset"));
        assert_eq!([200, 800], bool_weights("tx_enabled"));
        assert_eq!([600, 400], bool_weights("anything_else"));
        assert_eq!([600, 400], bool_weights("want_ack_presence"));
    }

    #[test]
    fn test_predictions() {
        assert_eq!(Some(64), enum_prediction("priority"));
        assert_eq!(Some(TEXT_MESSAGE_APP), enum_prediction("portnum"));
        assert_eq!(None, enum_prediction("hw_model"));
    }

    #[test]
    fn test_shape_models_are_codable() {
        // every tuned table keeps all 256 symbols strictly positive
        for shape in [
            Shape::Uniform,
            Shape::LowVarint,
            Shape::Battery,
            Shape::MidBand,
            Shape::Hops,
            Shape::ZeroSpike,
            Shape::Percent,
            Shape::Priority,
        ] {
            let model = model_for(shape);
            for symbol in 0..256 {
                let (low, high) = model.interval(symbol);
                assert!(high > low, "{shape:?} symbol {symbol}");
            }
        }
    }

    #[test]
    fn test_varint_position_models() {
        let models = ContextModels::new();
        let first = models.varint_model(true);
        let continuation = models.varint_model(false);
        let (flo, fhi) = first.interval(3);
        let (clo, chi) = continuation.interval(3);
        assert!(fhi - flo > chi - clo);
    }
}
