//! Depth-first traversal of a record, emitting and consuming coder symbols.
//!
//! The encode and decode walkers are exact mirrors: every symbol one side
//! produces, the other consumes against the same model, in the same order.
//! Profiles differ only through [`Hooks`]; the traversal itself is shared.
//!
//! Per-message symbol order: boolean-cluster bitmaps first (when enabled),
//! then the presence prelude or interleaved presence probes, then values in
//! declared order. `message_type` and the tracked `portnum` are scoped to
//! the enclosing message.

use std::io::{Read, Write};
use std::sync::Arc;

use tracing::trace;

use crate::arith::{Decoder, Encoder};
use crate::builder::ModelSet;
use crate::cluster;
use crate::context::{self, TEXT_MESSAGE_APP};
use crate::error::{Error, Result};
use crate::model::Model;
use crate::path;
use crate::profile::{HookFlags, Hooks, PresenceStrategy};
use crate::schema::{
    Cardinality, FieldDescriptor, Kind, MapKey, MessageDescriptor, Record, Value,
};
use crate::text;
use crate::varint::{decode_varint, encode_varint, zigzag_decode, zigzag_encode};

pub(crate) fn encode_record<M: ModelSet, W: Write>(
    record: &Record,
    models: M,
    hooks: Hooks,
    sink: &mut W,
) -> Result<()> {
    let mut walker = EncodeWalker {
        coder: Encoder::new(sink),
        models,
        hooks,
        message_type: String::new(),
        portnum: None,
    };
    walker.message(record, "")?;
    walker.coder.finish()?;
    Ok(())
}

pub(crate) fn decode_record<M: ModelSet, R: Read>(
    record: &mut Record,
    models: M,
    hooks: Hooks,
    source: &mut R,
) -> Result<()> {
    let mut walker = DecodeWalker {
        coder: Decoder::new(source)?,
        models,
        hooks,
        message_type: String::new(),
        portnum: None,
    };
    walker.message(record, "")
}

fn presence_model<M: ModelSet>(models: &mut M, hooks: Hooks, name: &str) -> Arc<Model> {
    if hooks.flags.contains(HookFlags::FIELD_BOOLS) {
        models.presence_model(name)
    } else {
        models.bool_model()
    }
}

fn bool_value_model<M: ModelSet>(models: &mut M, hooks: Hooks, name: &str) -> Arc<Model> {
    if hooks.flags.contains(HookFlags::FIELD_BOOLS) {
        models.field_bool_model(name)
    } else {
        models.bool_model()
    }
}

/// Cost in symbols of the delta presence prelude, or `None` when the present
/// tags are not strictly ascending and the prelude cannot be used.
fn delta_prelude_cost(record: &Record, descriptor: &MessageDescriptor) -> Option<usize> {
    let mut prev = 0u64;
    let mut count = 0u64;
    let mut cost = 0usize;
    for (index, field) in descriptor.fields().iter().enumerate() {
        if record.is_present(index) {
            let tag = u64::from(field.tag);
            if tag <= prev {
                return None;
            }
            cost += encode_varint(tag - prev).len();
            prev = tag;
            count += 1;
        }
    }
    Some(cost + encode_varint(count).len())
}

struct EncodeWalker<'w, M, W: Write> {
    coder: Encoder<&'w mut W>,
    models: M,
    hooks: Hooks,
    message_type: String,
    portnum: Option<i32>,
}

impl<M: ModelSet, W: Write> EncodeWalker<'_, M, W> {
    fn message(&mut self, record: &Record, fpath: &str) -> Result<()> {
        let descriptor = record.descriptor().clone();
        trace!(message = descriptor.name(), path = fpath, "encode message");
        let saved = std::mem::replace(&mut self.message_type, descriptor.name().to_owned());

        let clustered = if self.hooks.flags.contains(HookFlags::CLUSTERS) {
            self.clusters(record, &descriptor)?
        } else {
            vec![false; descriptor.fields().len()]
        };

        match self.hooks.presence {
            PresenceStrategy::Bits => {
                self.fields_with_bits(record, &descriptor, &clustered, fpath)?;
            }
            PresenceStrategy::Deltas => {
                self.fields_with_deltas(record, &descriptor, fpath)?;
            }
            PresenceStrategy::Flagged => {
                let use_deltas = matches!(
                    delta_prelude_cost(record, &descriptor),
                    Some(cost) if cost < descriptor.fields().len()
                );
                let model = self.models.bool_model();
                self.coder.encode(usize::from(use_deltas), &*model)?;
                if use_deltas {
                    self.fields_with_deltas(record, &descriptor, fpath)?;
                } else {
                    self.fields_with_bits(record, &descriptor, &clustered, fpath)?;
                }
            }
        }

        self.message_type = saved;
        if descriptor.name() == "Data" {
            self.portnum = None;
        }
        Ok(())
    }

    fn clusters(&mut self, record: &Record, descriptor: &MessageDescriptor) -> Result<Vec<bool>> {
        let mut mask = vec![false; descriptor.fields().len()];
        let model = self.models.byte_model();
        for cluster in cluster::clusters(descriptor) {
            let mut presence = 0u8;
            let mut values = 0u8;
            for (bit, &index) in cluster.fields.iter().enumerate() {
                mask[index] = true;
                if let Some(value) = record.get(index) {
                    let Value::Bool(set) = value else {
                        return Err(Error::InvariantViolation(
                            "clustered field holds a non-boolean value",
                        ));
                    };
                    presence |= 1 << bit;
                    if *set {
                        values |= 1 << bit;
                    }
                }
            }
            self.coder.encode(usize::from(presence), &*model)?;
            self.coder.encode(usize::from(values), &*model)?;
        }
        Ok(mask)
    }

    fn fields_with_bits(
        &mut self,
        record: &Record,
        descriptor: &MessageDescriptor,
        clustered: &[bool],
        fpath: &str,
    ) -> Result<()> {
        for (index, field) in descriptor.fields().iter().enumerate() {
            if clustered[index] {
                continue;
            }
            let value = record.get(index);
            let model = presence_model(&mut self.models, self.hooks, &field.name);
            self.coder.encode(usize::from(value.is_some()), &*model)?;
            if let Some(value) = value {
                self.field(field, value, fpath)
                    .map_err(|e| e.in_field(&field.name))?;
            }
        }
        Ok(())
    }

    fn fields_with_deltas(
        &mut self,
        record: &Record,
        descriptor: &MessageDescriptor,
        fpath: &str,
    ) -> Result<()> {
        let mut present = Vec::new();
        let mut prev = 0u64;
        for (index, field) in descriptor.fields().iter().enumerate() {
            if record.is_present(index) {
                let tag = u64::from(field.tag);
                if tag <= prev {
                    return Err(Error::InvariantViolation(
                        "present-field tags are not strictly ascending",
                    ));
                }
                present.push((index, tag - prev));
                prev = tag;
            }
        }
        self.prelude_varint(present.len() as u64)?;
        for &(_, delta) in &present {
            self.prelude_varint(delta)?;
        }
        for &(index, _) in &present {
            let field = &descriptor.fields()[index];
            if let Some(value) = record.get(index) {
                self.field(field, value, fpath)
                    .map_err(|e| e.in_field(&field.name))?;
            }
        }
        Ok(())
    }

    fn prelude_varint(&mut self, value: u64) -> Result<()> {
        let model = self.models.byte_model();
        for &byte in &*encode_varint(value) {
            self.coder.encode(usize::from(byte), &*model)?;
        }
        Ok(())
    }

    fn field(&mut self, field: &FieldDescriptor, value: &Value, parent: &str) -> Result<()> {
        let fpath = path::child(parent, &field.name);
        match field.cardinality {
            Cardinality::Singular => self.value(field, value, &fpath),
            Cardinality::Repeated => {
                let Value::List(items) = value else {
                    return Err(Error::InvariantViolation(
                        "repeated field holds a non-list value",
                    ));
                };
                self.length(items.len(), &fpath)?;
                let item_path = path::list_item(&fpath);
                for item in items {
                    self.value(field, item, &item_path)?;
                }
                Ok(())
            }
            Cardinality::Map => {
                let Value::Map(entries) = value else {
                    return Err(Error::InvariantViolation("map field holds a non-map value"));
                };
                self.length(entries.len(), &fpath)?;
                let key_path = path::map_key(&fpath);
                let value_path = path::map_value(&fpath);
                for (key, entry_value) in entries {
                    self.map_key(field, key, &key_path)?;
                    self.value(field, entry_value, &value_path)?;
                }
                Ok(())
            }
        }
    }

    fn value(&mut self, field: &FieldDescriptor, value: &Value, fpath: &str) -> Result<()> {
        match (field.kind, value) {
            (Kind::Message, Value::Message(inner)) => self.message(inner, fpath),
            (Kind::Bool, Value::Bool(set)) => {
                let model = bool_value_model(&mut self.models, self.hooks, &field.name);
                self.coder.encode(usize::from(*set), &*model)
            }
            (Kind::Enum, Value::Enum(number)) => self.enumeration(field, *number, fpath),
            (Kind::Int32, Value::I32(v)) => self.varint_value(i64::from(*v) as u64, field, fpath),
            (Kind::Int64, Value::I64(v)) => self.varint_value(*v as u64, field, fpath),
            (Kind::UInt32, Value::U32(v)) => self.varint_value(u64::from(*v), field, fpath),
            (Kind::UInt64, Value::U64(v)) => self.varint_value(*v, field, fpath),
            (Kind::SInt32, Value::I32(v)) => {
                self.varint_value(zigzag_encode(i64::from(*v)), field, fpath)
            }
            (Kind::SInt64, Value::I64(v)) => self.varint_value(zigzag_encode(*v), field, fpath),
            (Kind::Fixed32, Value::U32(v)) => self.fixed(&v.to_le_bytes()),
            (Kind::Fixed64, Value::U64(v)) => self.fixed(&v.to_le_bytes()),
            (Kind::SFixed32, Value::I32(v)) => self.fixed(&v.to_le_bytes()),
            (Kind::SFixed64, Value::I64(v)) => self.fixed(&v.to_le_bytes()),
            (Kind::Float, Value::F32(v)) => self.float_bytes(&v.to_le_bytes(), field, fpath),
            (Kind::Double, Value::F64(v)) => self.float_bytes(&v.to_le_bytes(), field, fpath),
            (Kind::String, Value::Str(s)) => self.text_buffer(s.as_bytes()),
            (Kind::Bytes, Value::Bytes(bytes)) => self.bytes_value(field, bytes),
            _ => Err(Error::InvariantViolation(
                "value does not match the declared kind",
            )),
        }
    }

    fn enumeration(&mut self, field: &FieldDescriptor, number: i32, fpath: &str) -> Result<()> {
        if field.name == "portnum" {
            self.portnum = Some(number);
        }
        let Some(enumeration) = &field.enum_type else {
            return Err(Error::UnsupportedKind("enum field without a descriptor"));
        };
        if self.hooks.flags.contains(HookFlags::ENUM_PREDICTION)
            && let Some(predicted) = context::enum_prediction(&field.name)
        {
            let hit = predicted == number;
            let model = self.models.bool_model();
            self.coder.encode(usize::from(hit), &*model)?;
            if hit {
                return Ok(());
            }
        }
        let index = enumeration
            .index_of(number)
            .ok_or_else(|| Error::UnknownEnumValue {
                enumeration: enumeration.name().to_owned(),
                number,
            })?;
        let model = self
            .models
            .enum_model(&self.message_type, fpath, enumeration);
        self.coder.encode(index, &*model)
    }

    fn varint_value(&mut self, raw: u64, field: &FieldDescriptor, fpath: &str) -> Result<()> {
        let bytes = encode_varint(raw);
        if self.hooks.flags.contains(HookFlags::VARINT_POSITION) {
            for (position, &byte) in bytes.iter().enumerate() {
                let model = self.models.varint_model(position == 0);
                self.coder.encode(usize::from(byte), &*model)?;
            }
        } else {
            let model = self.models.field_model(&self.message_type, fpath, field);
            for &byte in &*bytes {
                self.coder.encode(usize::from(byte), &*model)?;
            }
        }
        Ok(())
    }

    fn fixed(&mut self, bytes: &[u8]) -> Result<()> {
        let model = self.models.byte_model();
        for &byte in bytes {
            self.coder.encode(usize::from(byte), &*model)?;
        }
        Ok(())
    }

    fn float_bytes(&mut self, bytes: &[u8], field: &FieldDescriptor, fpath: &str) -> Result<()> {
        let model = self.models.field_model(&self.message_type, fpath, field);
        for &byte in bytes {
            self.coder.encode(usize::from(byte), &*model)?;
        }
        Ok(())
    }

    fn length(&mut self, len: usize, fpath: &str) -> Result<()> {
        let lpath = path::length(fpath);
        let model = self.models.length_model(&self.message_type, &lpath);
        for &byte in &*encode_varint(len as u64) {
            self.coder.encode(usize::from(byte), &*model)?;
        }
        Ok(())
    }

    fn text_buffer(&mut self, bytes: &[u8]) -> Result<()> {
        let buffer = text::encode_text(self.hooks.text, bytes)?;
        let model = self.models.byte_model();
        for &byte in &*encode_varint(buffer.len() as u64) {
            self.coder.encode(usize::from(byte), &*model)?;
        }
        for &byte in &buffer {
            self.coder.encode(usize::from(byte), &*model)?;
        }
        Ok(())
    }

    fn bytes_value(&mut self, field: &FieldDescriptor, bytes: &[u8]) -> Result<()> {
        if field.name == "payload" && self.message_type == "Data" {
            let is_text = payload_is_text(self.portnum, bytes);
            let model = self.models.bool_model();
            self.coder.encode(usize::from(is_text), &*model)?;
            if is_text {
                return self.text_buffer(bytes);
            }
        }
        let model = self.models.byte_model();
        for &byte in &*encode_varint(bytes.len() as u64) {
            self.coder.encode(usize::from(byte), &*model)?;
        }
        for &byte in bytes {
            self.coder.encode(usize::from(byte), &*model)?;
        }
        Ok(())
    }

    fn map_key(&mut self, field: &FieldDescriptor, key: &MapKey, kpath: &str) -> Result<()> {
        let Some(kind) = field.map_key else {
            return Err(Error::UnsupportedKind("map field without a key kind"));
        };
        match (kind, key) {
            (Kind::Bool, MapKey::Bool(set)) => {
                let model = self.models.bool_model();
                self.coder.encode(usize::from(*set), &*model)
            }
            (Kind::Int32, MapKey::I32(v)) => self.map_key_varint(i64::from(*v) as u64, kpath),
            (Kind::Int64, MapKey::I64(v)) => self.map_key_varint(*v as u64, kpath),
            (Kind::SInt32, MapKey::I32(v)) => {
                self.map_key_varint(zigzag_encode(i64::from(*v)), kpath)
            }
            (Kind::SInt64, MapKey::I64(v)) => self.map_key_varint(zigzag_encode(*v), kpath),
            (Kind::UInt32, MapKey::U32(v)) => self.map_key_varint(u64::from(*v), kpath),
            (Kind::UInt64, MapKey::U64(v)) => self.map_key_varint(*v, kpath),
            (Kind::String, MapKey::Str(s)) => self.text_buffer(s.as_bytes()),
            _ => Err(Error::UnsupportedKind("map key kind")),
        }
    }

    fn map_key_varint(&mut self, raw: u64, kpath: &str) -> Result<()> {
        let model = self.models.length_model(&self.message_type, kpath);
        for &byte in &*encode_varint(raw) {
            self.coder.encode(usize::from(byte), &*model)?;
        }
        Ok(())
    }
}

struct DecodeWalker<'r, M, R: Read> {
    coder: Decoder<&'r mut R>,
    models: M,
    hooks: Hooks,
    message_type: String,
    portnum: Option<i32>,
}

impl<M: ModelSet, R: Read> DecodeWalker<'_, M, R> {
    fn message(&mut self, record: &mut Record, fpath: &str) -> Result<()> {
        let descriptor = record.descriptor().clone();
        trace!(message = descriptor.name(), path = fpath, "decode message");
        let saved = std::mem::replace(&mut self.message_type, descriptor.name().to_owned());

        let clustered = if self.hooks.flags.contains(HookFlags::CLUSTERS) {
            self.clusters(record, &descriptor)?
        } else {
            vec![false; descriptor.fields().len()]
        };

        match self.hooks.presence {
            PresenceStrategy::Bits => {
                self.fields_with_bits(record, &descriptor, &clustered, fpath)?;
            }
            PresenceStrategy::Deltas => {
                self.fields_with_deltas(record, &descriptor, fpath)?;
            }
            PresenceStrategy::Flagged => {
                let model = self.models.bool_model();
                if self.coder.decode(&*model)? == 1 {
                    self.fields_with_deltas(record, &descriptor, fpath)?;
                } else {
                    self.fields_with_bits(record, &descriptor, &clustered, fpath)?;
                }
            }
        }

        self.message_type = saved;
        if descriptor.name() == "Data" {
            self.portnum = None;
        }
        Ok(())
    }

    fn clusters(
        &mut self,
        record: &mut Record,
        descriptor: &MessageDescriptor,
    ) -> Result<Vec<bool>> {
        let mut mask = vec![false; descriptor.fields().len()];
        let model = self.models.byte_model();
        for cluster in cluster::clusters(descriptor) {
            let presence = self.coder.decode(&*model)? as u8;
            let values = self.coder.decode(&*model)? as u8;
            let width = cluster.fields.len();
            if width < 8 && (presence >> width != 0 || values >> width != 0) {
                return Err(Error::InvariantViolation(
                    "cluster bitmap references an out-of-range bit",
                ));
            }
            if values & !presence != 0 {
                return Err(Error::InvariantViolation(
                    "cluster value bit set for an absent field",
                ));
            }
            for (bit, &index) in cluster.fields.iter().enumerate() {
                mask[index] = true;
                if presence & (1 << bit) != 0 {
                    record.set(index, Value::Bool(values & (1 << bit) != 0));
                }
            }
        }
        Ok(mask)
    }

    fn fields_with_bits(
        &mut self,
        record: &mut Record,
        descriptor: &MessageDescriptor,
        clustered: &[bool],
        fpath: &str,
    ) -> Result<()> {
        for (index, field) in descriptor.fields().iter().enumerate() {
            if clustered[index] {
                continue;
            }
            let model = presence_model(&mut self.models, self.hooks, &field.name);
            if self.coder.decode(&*model)? == 1 {
                let value = self
                    .field(field, fpath)
                    .map_err(|e| e.in_field(&field.name))?;
                record.set(index, value);
            }
        }
        Ok(())
    }

    fn fields_with_deltas(
        &mut self,
        record: &mut Record,
        descriptor: &MessageDescriptor,
        fpath: &str,
    ) -> Result<()> {
        let count = self.prelude_varint()? as usize;
        if count > descriptor.fields().len() {
            return Err(Error::InvariantViolation(
                "more present fields than declared",
            ));
        }
        let mut prev = 0u64;
        let mut present = Vec::with_capacity(count);
        for _ in 0..count {
            let delta = self.prelude_varint()?;
            let tag = prev
                .checked_add(delta)
                .filter(|&t| t > prev || prev == 0)
                .ok_or(Error::InvariantViolation("tag delta does not ascend"))?;
            let tag = u32::try_from(tag)
                .map_err(|_| Error::InvariantViolation("tag delta overflows a field tag"))?;
            let (index, _) = descriptor
                .field_by_tag(tag)
                .ok_or(Error::InvariantViolation("tag delta names an undeclared field"))?;
            present.push(index);
            prev = u64::from(tag);
        }
        for index in present {
            let field = &descriptor.fields()[index];
            let value = self
                .field(field, fpath)
                .map_err(|e| e.in_field(&field.name))?;
            record.set(index, value);
        }
        Ok(())
    }

    fn prelude_varint(&mut self) -> Result<u64> {
        let model = self.models.byte_model();
        decode_varint(|_| Ok(self.coder.decode(&*model)? as u8))
    }

    fn field(&mut self, field: &FieldDescriptor, parent: &str) -> Result<Value> {
        let fpath = path::child(parent, &field.name);
        match field.cardinality {
            Cardinality::Singular => self.value(field, &fpath),
            Cardinality::Repeated => {
                let count = self.length(&fpath)?;
                let item_path = path::list_item(&fpath);
                let mut items = Vec::with_capacity(count.min(1 << 12));
                for _ in 0..count {
                    items.push(self.value(field, &item_path)?);
                }
                Ok(Value::List(items))
            }
            Cardinality::Map => {
                let count = self.length(&fpath)?;
                let key_path = path::map_key(&fpath);
                let value_path = path::map_value(&fpath);
                let mut entries = Vec::with_capacity(count.min(1 << 12));
                for _ in 0..count {
                    let key = self.map_key(field, &key_path)?;
                    let value = self.value(field, &value_path)?;
                    entries.push((key, value));
                }
                Ok(Value::Map(entries))
            }
        }
    }

    fn value(&mut self, field: &FieldDescriptor, fpath: &str) -> Result<Value> {
        match field.kind {
            Kind::Message => {
                let Some(inner_type) = &field.message_type else {
                    return Err(Error::UnsupportedKind("message field without a descriptor"));
                };
                let mut inner = Record::new(inner_type.clone());
                self.message(&mut inner, fpath)?;
                Ok(Value::Message(inner))
            }
            Kind::Bool => {
                let model = bool_value_model(&mut self.models, self.hooks, &field.name);
                Ok(Value::Bool(self.coder.decode(&*model)? == 1))
            }
            Kind::Enum => self.enumeration(field, fpath),
            Kind::Int32 => {
                let raw = self.varint_value(field, fpath)?;
                Ok(Value::I32(raw as i64 as i32))
            }
            Kind::Int64 => Ok(Value::I64(self.varint_value(field, fpath)? as i64)),
            Kind::UInt32 => Ok(Value::U32(self.varint_value(field, fpath)? as u32)),
            Kind::UInt64 => Ok(Value::U64(self.varint_value(field, fpath)?)),
            Kind::SInt32 => {
                let raw = self.varint_value(field, fpath)?;
                Ok(Value::I32(zigzag_decode(raw) as i32))
            }
            Kind::SInt64 => Ok(Value::I64(zigzag_decode(self.varint_value(field, fpath)?))),
            Kind::Fixed32 => Ok(Value::U32(u32::from_le_bytes(self.fixed()?))),
            Kind::Fixed64 => Ok(Value::U64(u64::from_le_bytes(self.fixed()?))),
            Kind::SFixed32 => Ok(Value::I32(i32::from_le_bytes(self.fixed()?))),
            Kind::SFixed64 => Ok(Value::I64(i64::from_le_bytes(self.fixed()?))),
            Kind::Float => Ok(Value::F32(f32::from_le_bytes(
                self.float_bytes(field, fpath)?,
            ))),
            Kind::Double => Ok(Value::F64(f64::from_le_bytes(
                self.float_bytes(field, fpath)?,
            ))),
            Kind::String => {
                let bytes = self.text_bytes()?;
                String::from_utf8(bytes)
                    .map(Value::Str)
                    .map_err(|_| Error::TextDecode("string field is not valid UTF-8"))
            }
            Kind::Bytes => self.bytes_value(field),
        }
    }

    fn enumeration(&mut self, field: &FieldDescriptor, fpath: &str) -> Result<Value> {
        let Some(enumeration) = &field.enum_type else {
            return Err(Error::UnsupportedKind("enum field without a descriptor"));
        };
        let mut number = None;
        if self.hooks.flags.contains(HookFlags::ENUM_PREDICTION)
            && let Some(predicted) = context::enum_prediction(&field.name)
        {
            let model = self.models.bool_model();
            if self.coder.decode(&*model)? == 1 {
                number = Some(predicted);
            }
        }
        let number = match number {
            Some(number) => number,
            None => {
                let model = self
                    .models
                    .enum_model(&self.message_type, fpath, enumeration);
                let index = self.coder.decode(&*model)?;
                enumeration
                    .by_index(index)
                    .map(|v| v.number)
                    .ok_or_else(|| Error::InvalidEnumIndex {
                        enumeration: enumeration.name().to_owned(),
                        index,
                    })?
            }
        };
        if field.name == "portnum" {
            self.portnum = Some(number);
        }
        Ok(Value::Enum(number))
    }

    fn varint_value(&mut self, field: &FieldDescriptor, fpath: &str) -> Result<u64> {
        if self.hooks.flags.contains(HookFlags::VARINT_POSITION) {
            decode_varint(|position| {
                let model = self.models.varint_model(position == 0);
                Ok(self.coder.decode(&*model)? as u8)
            })
        } else {
            let model = self.models.field_model(&self.message_type, fpath, field);
            decode_varint(|_| Ok(self.coder.decode(&*model)? as u8))
        }
    }

    fn fixed<const N: usize>(&mut self) -> Result<[u8; N]> {
        let model = self.models.byte_model();
        let mut bytes = [0u8; N];
        for byte in &mut bytes {
            *byte = self.coder.decode(&*model)? as u8;
        }
        Ok(bytes)
    }

    fn float_bytes<const N: usize>(
        &mut self,
        field: &FieldDescriptor,
        fpath: &str,
    ) -> Result<[u8; N]> {
        let model = self.models.field_model(&self.message_type, fpath, field);
        let mut bytes = [0u8; N];
        for byte in &mut bytes {
            *byte = self.coder.decode(&*model)? as u8;
        }
        Ok(bytes)
    }

    fn length(&mut self, fpath: &str) -> Result<usize> {
        let lpath = path::length(fpath);
        let model = self.models.length_model(&self.message_type, &lpath);
        let raw = decode_varint(|_| Ok(self.coder.decode(&*model)? as u8))?;
        usize::try_from(raw).map_err(|_| Error::InvariantViolation("length overflows usize"))
    }

    fn text_bytes(&mut self) -> Result<Vec<u8>> {
        let model = self.models.byte_model();
        let length = decode_varint(|_| Ok(self.coder.decode(&*model)? as u8))? as usize;
        let mut buffer = Vec::with_capacity(length.min(1 << 16));
        for _ in 0..length {
            buffer.push(self.coder.decode(&*model)? as u8);
        }
        text::decode_text(self.hooks.text, &buffer)
    }

    fn bytes_value(&mut self, field: &FieldDescriptor) -> Result<Value> {
        if field.name == "payload" && self.message_type == "Data" {
            let model = self.models.bool_model();
            if self.coder.decode(&*model)? == 1 {
                return self.text_bytes().map(Value::Bytes);
            }
        }
        let model = self.models.byte_model();
        let length = decode_varint(|_| Ok(self.coder.decode(&*model)? as u8))? as usize;
        let mut bytes = Vec::with_capacity(length.min(1 << 16));
        for _ in 0..length {
            bytes.push(self.coder.decode(&*model)? as u8);
        }
        Ok(Value::Bytes(bytes))
    }

    fn map_key(&mut self, field: &FieldDescriptor, kpath: &str) -> Result<MapKey> {
        let Some(kind) = field.map_key else {
            return Err(Error::UnsupportedKind("map field without a key kind"));
        };
        match kind {
            Kind::Bool => {
                let model = self.models.bool_model();
                Ok(MapKey::Bool(self.coder.decode(&*model)? == 1))
            }
            Kind::Int32 => Ok(MapKey::I32(self.map_key_varint(kpath)? as i64 as i32)),
            Kind::Int64 => Ok(MapKey::I64(self.map_key_varint(kpath)? as i64)),
            Kind::SInt32 => Ok(MapKey::I32(zigzag_decode(self.map_key_varint(kpath)?) as i32)),
            Kind::SInt64 => Ok(MapKey::I64(zigzag_decode(self.map_key_varint(kpath)?))),
            Kind::UInt32 => Ok(MapKey::U32(self.map_key_varint(kpath)? as u32)),
            Kind::UInt64 => Ok(MapKey::U64(self.map_key_varint(kpath)?)),
            Kind::String => {
                let bytes = self.text_bytes()?;
                String::from_utf8(bytes)
                    .map(MapKey::Str)
                    .map_err(|_| Error::TextDecode("map key is not valid UTF-8"))
            }
            _ => Err(Error::UnsupportedKind("map key kind")),
        }
    }

    fn map_key_varint(&mut self, kpath: &str) -> Result<u64> {
        let model = self.models.length_model(&self.message_type, kpath);
        decode_varint(|_| Ok(self.coder.decode(&*model)? as u8))
    }
}

/// Whether a `Data.payload` should travel through the text coder.
pub(crate) fn payload_is_text(portnum: Option<i32>, bytes: &[u8]) -> bool {
    portnum == Some(TEXT_MESSAGE_APP) || text::looks_like_text(bytes)
}
