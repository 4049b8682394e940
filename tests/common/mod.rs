//! Mesh telemetry fixture schema shared by the integration tests.
#![allow(dead_code)]

use std::sync::Arc;

use meshpress::schema::{
    EnumDescriptor, FieldDescriptor, Kind, MapKey, MessageDescriptor, Record, Value,
};

pub fn port_num() -> Arc<EnumDescriptor> {
    EnumDescriptor::new(
        "PortNum",
        [
            ("UNKNOWN_APP", 0),
            ("TEXT_MESSAGE_APP", 1),
            ("REMOTE_HARDWARE_APP", 2),
            ("POSITION_APP", 3),
            ("NODEINFO_APP", 4),
            ("ROUTING_APP", 5),
            ("ADMIN_APP", 6),
            ("TELEMETRY_APP", 67),
            ("TRACEROUTE_APP", 70),
        ],
    )
}

pub fn hardware_model() -> Arc<EnumDescriptor> {
    EnumDescriptor::new(
        "HardwareModel",
        [
            ("UNSET", 0),
            ("TLORA_V2", 1),
            ("TLORA_V1", 2),
            ("TLORA_V2_1_1P6", 3),
            ("TBEAM", 4),
            ("HELTEC_V2_0", 5),
            ("TBEAM_V0P7", 6),
            ("T_ECHO", 7),
            ("RAK4631", 9),
        ],
    )
}

pub fn priority() -> Arc<EnumDescriptor> {
    EnumDescriptor::new(
        "Priority",
        [
            ("UNSET", 0),
            ("MIN", 1),
            ("BACKGROUND", 10),
            ("DEFAULT", 64),
            ("RELIABLE", 70),
            ("ACK", 120),
            ("MAX", 127),
        ],
    )
}

pub fn role() -> Arc<EnumDescriptor> {
    EnumDescriptor::new(
        "Role",
        [
            ("CLIENT", 0),
            ("CLIENT_MUTE", 1),
            ("ROUTER", 2),
            ("ROUTER_CLIENT", 3),
            ("REPEATER", 4),
            ("TRACKER", 5),
        ],
    )
}

pub fn position() -> Arc<MessageDescriptor> {
    MessageDescriptor::new(
        "Position",
        vec![
            FieldDescriptor::scalar(1, "latitude_i", Kind::SFixed32),
            FieldDescriptor::scalar(2, "longitude_i", Kind::SFixed32),
            FieldDescriptor::scalar(3, "altitude", Kind::Int32),
            FieldDescriptor::scalar(4, "time", Kind::Fixed32),
            FieldDescriptor::scalar(5, "ground_speed", Kind::UInt32),
            FieldDescriptor::scalar(6, "sats_in_view", Kind::UInt32),
            FieldDescriptor::scalar(7, "precision_bits", Kind::UInt32),
            FieldDescriptor::scalar(8, "ground_track", Kind::UInt32),
        ],
    )
}

pub fn user() -> Arc<MessageDescriptor> {
    MessageDescriptor::new(
        "User",
        vec![
            FieldDescriptor::scalar(1, "id", Kind::String),
            FieldDescriptor::scalar(2, "long_name", Kind::String),
            FieldDescriptor::scalar(3, "short_name", Kind::String),
            FieldDescriptor::enumeration(4, "hw_model", hardware_model()),
            FieldDescriptor::scalar(5, "is_licensed", Kind::Bool),
            FieldDescriptor::enumeration(6, "role", role()),
        ],
    )
}

pub fn data() -> Arc<MessageDescriptor> {
    MessageDescriptor::new(
        "Data",
        vec![
            FieldDescriptor::enumeration(1, "portnum", port_num()),
            FieldDescriptor::scalar(2, "payload", Kind::Bytes),
            FieldDescriptor::scalar(3, "want_response", Kind::Bool),
            FieldDescriptor::scalar(4, "dest", Kind::Fixed32),
            FieldDescriptor::scalar(5, "source", Kind::Fixed32),
            FieldDescriptor::scalar(6, "request_id", Kind::Fixed32),
            FieldDescriptor::scalar(7, "reply_id", Kind::Fixed32),
            FieldDescriptor::scalar(8, "emoji", Kind::UInt32),
        ],
    )
}

pub fn mesh_packet() -> Arc<MessageDescriptor> {
    MessageDescriptor::new(
        "MeshPacket",
        vec![
            FieldDescriptor::scalar(1, "from", Kind::Fixed32),
            FieldDescriptor::scalar(2, "to", Kind::Fixed32),
            FieldDescriptor::scalar(3, "channel", Kind::UInt32),
            FieldDescriptor::message(4, "decoded", data()),
            FieldDescriptor::scalar(5, "id", Kind::Fixed32),
            FieldDescriptor::scalar(6, "rx_time", Kind::Fixed32),
            FieldDescriptor::scalar(7, "rx_snr", Kind::Float),
            FieldDescriptor::scalar(8, "hop_limit", Kind::UInt32),
            FieldDescriptor::scalar(9, "want_ack", Kind::Bool),
            FieldDescriptor::scalar(10, "via_mqtt", Kind::Bool),
            FieldDescriptor::scalar(11, "pki_encrypted", Kind::Bool),
            FieldDescriptor::enumeration(12, "priority", priority()),
            FieldDescriptor::scalar(13, "rx_rssi", Kind::Int32),
            FieldDescriptor::scalar(14, "hop_start", Kind::UInt32),
            FieldDescriptor::scalar(15, "public_key", Kind::Bytes),
        ],
    )
}

pub fn device_metrics() -> Arc<MessageDescriptor> {
    MessageDescriptor::new(
        "DeviceMetrics",
        vec![
            FieldDescriptor::scalar(1, "battery_level", Kind::UInt32),
            FieldDescriptor::scalar(2, "voltage", Kind::Float),
            FieldDescriptor::scalar(3, "channel_utilization", Kind::Float),
            FieldDescriptor::scalar(4, "air_util_tx", Kind::Float),
            FieldDescriptor::scalar(5, "uptime_seconds", Kind::UInt32),
        ],
    )
}

pub fn node_info() -> Arc<MessageDescriptor> {
    MessageDescriptor::new(
        "NodeInfo",
        vec![
            FieldDescriptor::scalar(1, "num", Kind::Fixed32),
            FieldDescriptor::message(2, "user", user()),
            FieldDescriptor::message(3, "position", position()),
            FieldDescriptor::scalar(4, "snr", Kind::Float),
            FieldDescriptor::scalar(5, "last_heard", Kind::Fixed32),
            FieldDescriptor::message(6, "device_metrics", device_metrics()),
            FieldDescriptor::scalar(7, "channel", Kind::UInt32),
            FieldDescriptor::scalar(8, "hops_away", Kind::UInt32),
            FieldDescriptor::scalar(9, "is_favorite", Kind::Bool),
        ],
    )
}

pub fn route_discovery() -> Arc<MessageDescriptor> {
    MessageDescriptor::new(
        "RouteDiscovery",
        vec![
            FieldDescriptor::scalar(1, "route", Kind::Fixed32).repeated(),
            FieldDescriptor::scalar(2, "snr_towards", Kind::Int32).repeated(),
        ],
    )
}

pub fn stats() -> Arc<MessageDescriptor> {
    MessageDescriptor::new(
        "Stats",
        vec![
            FieldDescriptor::map(1, "counts", Kind::UInt32, Kind::UInt32),
            FieldDescriptor::map(2, "labels", Kind::String, Kind::String),
            FieldDescriptor::scalar(3, "offsets", Kind::SInt64).repeated(),
            FieldDescriptor::scalar(4, "ratio", Kind::Double),
        ],
    )
}

// --- scenario records ---

/// Scenario 1: a position report.
pub fn position_record() -> Record {
    let mut record = Record::new(position());
    record
        .set_by_name("latitude_i", Value::I32(375_317_890))
        .set_by_name("longitude_i", Value::I32(-1_223_898_570))
        .set_by_name("altitude", Value::I32(100))
        .set_by_name("time", Value::U32(1_703_520_000));
    record
}

/// Scenario 2: a user profile.
pub fn user_record() -> Record {
    let mut record = Record::new(user());
    record
        .set_by_name("id", Value::Str("!12345678".into()))
        .set_by_name("long_name", Value::Str("Test Meshtastic Node".into()))
        .set_by_name("short_name", Value::Str("TEST".into()))
        .set_by_name("hw_model", Value::Enum(4));
    record
}

pub const TEXT_PAYLOAD: &str =
    "This is a test message being sent over the Meshtastic network";

/// Scenario 3: a text packet, exactly the fields the scenario names.
pub fn text_packet() -> Record {
    let mut inner = Record::new(data());
    inner
        .set_by_name("portnum", Value::Enum(1))
        .set_by_name("payload", Value::Bytes(TEXT_PAYLOAD.as_bytes().to_vec()));
    let mut record = Record::new(mesh_packet());
    record
        .set_by_name("from", Value::U32(123_456_789))
        .set_by_name("to", Value::U32(987_654_321))
        .set_by_name("decoded", Value::Message(inner));
    record
}

/// Scenario 4: a packet whose three adjacent booleans form a cluster.
pub fn cluster_packet() -> Record {
    let mut record = Record::new(mesh_packet());
    record
        .set_by_name("want_ack", Value::Bool(true))
        .set_by_name("via_mqtt", Value::Bool(false))
        .set_by_name("pki_encrypted", Value::Bool(false));
    record
}

/// Scenario 5: a packet whose priority holds the predicted value.
pub fn priority_packet() -> Record {
    let mut record = Record::new(mesh_packet());
    record.set_by_name("priority", Value::Enum(64));
    record
}

/// Scenario 6: a position with only three fields present.
pub fn sparse_position() -> Record {
    let mut record = Record::new(position());
    record
        .set_by_name("latitude_i", Value::I32(375_317_890))
        .set_by_name("longitude_i", Value::I32(-1_223_898_570))
        .set_by_name("time", Value::U32(1_703_520_000));
    record
}

// --- typical corpus records for the aggregate size property ---

pub fn typical_text_packet() -> Record {
    let mut record = text_packet();
    record
        .set_by_name("channel", Value::U32(0))
        .set_by_name("hop_limit", Value::U32(3))
        .set_by_name("id", Value::U32(0x12ab_34cd))
        .set_by_name("rx_time", Value::U32(1_703_520_123));
    record
}

pub fn typical_cluster_packet() -> Record {
    let mut record = cluster_packet();
    record
        .set_by_name("from", Value::U32(0x0a0b_0c0d))
        .set_by_name("to", Value::U32(0xffff_ffff))
        .set_by_name("channel", Value::U32(0))
        .set_by_name("hop_limit", Value::U32(3))
        .set_by_name("priority", Value::Enum(64));
    record
}

pub fn node_info_record() -> Record {
    let mut record = Record::new(node_info());
    record
        .set_by_name("num", Value::U32(0x1234_abcd))
        .set_by_name("user", Value::Message(user_record()))
        .set_by_name("snr", Value::F32(-7.25))
        .set_by_name("last_heard", Value::U32(1_703_520_000))
        .set_by_name("channel", Value::U32(0))
        .set_by_name("hops_away", Value::U32(2));
    record
}

pub fn device_metrics_record() -> Record {
    let mut record = Record::new(device_metrics());
    record
        .set_by_name("battery_level", Value::U32(85))
        .set_by_name("uptime_seconds", Value::U32(86_400));
    record
}

pub fn routing_packet() -> Record {
    let mut record = Record::new(mesh_packet());
    record
        .set_by_name("from", Value::U32(0x1a2b_3c4d))
        .set_by_name("to", Value::U32(0x4d3c_2b1a))
        .set_by_name("channel", Value::U32(0))
        .set_by_name("hop_limit", Value::U32(3))
        .set_by_name("hop_start", Value::U32(3))
        .set_by_name("priority", Value::Enum(64))
        .set_by_name("rx_rssi", Value::I32(-80));
    record
}

pub fn long_text_packet() -> Record {
    let mut inner = Record::new(data());
    inner
        .set_by_name("portnum", Value::Enum(1))
        .set_by_name(
            "payload",
            Value::Bytes(
                b"Meeting at the north trailhead at noon. Bring water and the spare \
                  battery pack for the repeater on the ridge, the solar one is down again."
                    .to_vec(),
            ),
        );
    let mut record = Record::new(mesh_packet());
    record
        .set_by_name("from", Value::U32(0x5566_7788))
        .set_by_name("to", Value::U32(0x8877_6655))
        .set_by_name("channel", Value::U32(0))
        .set_by_name("hop_limit", Value::U32(3))
        .set_by_name("decoded", Value::Message(inner));
    record
}

pub fn route_record() -> Record {
    let mut record = Record::new(route_discovery());
    record
        .set_by_name(
            "route",
            Value::List(vec![
                Value::U32(0x1111_2222),
                Value::U32(0x3333_4444),
                Value::U32(0x5555_6666),
            ]),
        )
        .set_by_name(
            "snr_towards",
            Value::List(vec![Value::I32(-32), Value::I32(10), Value::I32(-7)]),
        );
    record
}

pub fn stats_record() -> Record {
    let mut record = Record::new(stats());
    record
        .set_by_name(
            "counts",
            Value::Map(vec![
                (MapKey::U32(1), Value::U32(42)),
                (MapKey::U32(67), Value::U32(7)),
            ]),
        )
        .set_by_name(
            "labels",
            Value::Map(vec![
                (MapKey::Str("region".into()), Value::Str("US".into())),
                (MapKey::Str("band".into()), Value::Str("LongFast".into())),
            ]),
        )
        .set_by_name(
            "offsets",
            Value::List(vec![Value::I64(-3), Value::I64(0), Value::I64(1 << 40)]),
        )
        .set_by_name("ratio", Value::F64(0.8125));
    record
}

// --- reference size of the plain schema serialization ---

fn varint_len(value: u64) -> usize {
    let mut len = 1;
    let mut v = value >> 7;
    while v != 0 {
        len += 1;
        v >>= 7;
    }
    len
}

fn zigzag(value: i64) -> u64 {
    ((value as u64) << 1) ^ ((value >> 63) as u64)
}

fn scalar_wire_size(field: &FieldDescriptor, value: &Value) -> usize {
    match value {
        Value::Bool(_) => 1,
        Value::I32(v) => match field.kind {
            Kind::SInt32 => varint_len(zigzag(i64::from(*v))),
            Kind::SFixed32 => 4,
            _ => varint_len(i64::from(*v) as u64),
        },
        Value::I64(v) => match field.kind {
            Kind::SInt64 => varint_len(zigzag(*v)),
            Kind::SFixed64 => 8,
            _ => varint_len(*v as u64),
        },
        Value::U32(v) => match field.kind {
            Kind::Fixed32 => 4,
            _ => varint_len(u64::from(*v)),
        },
        Value::U64(v) => match field.kind {
            Kind::Fixed64 => 8,
            _ => varint_len(*v),
        },
        Value::F32(_) => 4,
        Value::F64(_) => 8,
        Value::Enum(v) => varint_len(*v as i64 as u64),
        Value::Str(s) => varint_len(s.len() as u64) + s.len(),
        Value::Bytes(b) => varint_len(b.len() as u64) + b.len(),
        Value::Message(inner) => {
            let size = wire_size(inner);
            varint_len(size as u64) + size
        }
        Value::List(_) | Value::Map(_) => 0,
    }
}

fn map_key_wire_size(key: &MapKey) -> usize {
    match key {
        MapKey::Bool(_) => 1,
        MapKey::I32(v) => varint_len(i64::from(*v) as u64),
        MapKey::I64(v) => varint_len(*v as u64),
        MapKey::U32(v) => varint_len(u64::from(*v)),
        MapKey::U64(v) => varint_len(*v),
        MapKey::Str(s) => varint_len(s.len() as u64) + s.len(),
    }
}

/// Serialized size of `record` in the plain tag/length/varint schema format,
/// the reference the compression ratios are measured against.
pub fn wire_size(record: &Record) -> usize {
    let descriptor = record.descriptor().clone();
    let mut size = 0;
    for (index, field) in descriptor.fields().iter().enumerate() {
        let Some(value) = record.get(index) else {
            continue;
        };
        let tag_len = varint_len(u64::from(field.tag) << 3);
        match value {
            Value::List(items) => {
                for item in items {
                    size += tag_len + scalar_wire_size(field, item);
                }
            }
            Value::Map(entries) => {
                for (key, entry_value) in entries {
                    let entry =
                        1 + map_key_wire_size(key) + 1 + scalar_wire_size(field, entry_value);
                    size += tag_len + varint_len(entry as u64) + entry;
                }
            }
            value => size += tag_len + scalar_wire_size(field, value),
        }
    }
    size
}
