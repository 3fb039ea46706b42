//! # Message Descriptor Facade
//!
//! The only place where `grebe-core` touches concrete message contents.
//!
//! Every other module works with a [`MessageType`] (a handle to a `prost_reflect`
//! [`MessageDescriptor`]) and with [`DynamicMessage`] instances built from it, so no
//! component needs compile-time knowledge of the request or response types.
//!
//! ## Operations
//!
//! * [`MessageType::new_instance`]: an empty message of the given type.
//! * [`MessageType::decode_json`]: decode protobuf JSON and merge it into an instance.
//! * [`merge`]: merge one instance into another of the same type.
//! * [`encode_json`]: encode an instance as protobuf JSON.
use prost::Message;
use prost_reflect::{DynamicMessage, MessageDescriptor, ReflectMessage, SerializeOptions};
use std::fmt;

#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("{0}")]
    Json(#[from] serde_json::Error),
    #[error("Expected a message of type '{expected}' but got '{actual}'")]
    TypeMismatch { expected: String, actual: String },
    #[error("Failed to merge message: {0}")]
    Merge(#[from] prost::DecodeError),
}

#[derive(Debug, thiserror::Error)]
pub enum EncodeError {
    #[error("Failed to encode message '{name}' as JSON: {source}")]
    Json {
        name: String,
        #[source]
        source: serde_json::Error,
    },
}

/// How a message is rendered by [`encode_json`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JsonFormat {
    /// Indent the output with two spaces.
    pub pretty: bool,
    /// Emit fields that hold their default value.
    pub emit_defaults: bool,
}

impl JsonFormat {
    /// Single line, default values omitted. Used for response bodies.
    pub const COMPACT: JsonFormat = JsonFormat {
        pretty: false,
        emit_defaults: false,
    };

    /// Indented, every field emitted. Used for documentation examples.
    pub const DOCUMENTATION: JsonFormat = JsonFormat {
        pretty: true,
        emit_defaults: true,
    };

    fn options(self) -> SerializeOptions {
        SerializeOptions::new().skip_default_fields(!self.emit_defaults)
    }
}

/// A handle to a message type, resolved from descriptors at runtime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageType(MessageDescriptor);

impl MessageType {
    pub fn new(descriptor: MessageDescriptor) -> Self {
        Self(descriptor)
    }

    pub fn descriptor(&self) -> &MessageDescriptor {
        &self.0
    }

    /// Returns the fully qualified name (e.g. `example.ExampleRequest`).
    pub fn full_name(&self) -> &str {
        self.0.full_name()
    }

    /// Creates a message of this type with every field unset.
    pub fn new_instance(&self) -> DynamicMessage {
        DynamicMessage::new(self.0.clone())
    }

    /// Decodes a protobuf JSON document and merges it into `instance`.
    ///
    /// An empty (or whitespace only) document is treated as `{}`.
    ///
    /// # Returns
    ///
    /// * `Ok(())` - `instance` now holds the decoded fields.
    /// * `Err(DecodeError)` - The JSON is malformed, does not match the schema, or
    ///   `instance` is not of this type. `instance` is left untouched.
    pub fn decode_json(
        &self,
        instance: &mut DynamicMessage,
        json: &[u8],
    ) -> Result<(), DecodeError> {
        self.check(instance)?;

        if json.iter().all(u8::is_ascii_whitespace) {
            return Ok(());
        }

        let mut deserializer = serde_json::Deserializer::from_slice(json);
        let decoded = DynamicMessage::deserialize(self.0.clone(), &mut deserializer)?;
        deserializer.end()?;

        merge(instance, &decoded)
    }

    fn check(&self, instance: &DynamicMessage) -> Result<(), DecodeError> {
        if instance.descriptor() == self.0 {
            Ok(())
        } else {
            Err(DecodeError::TypeMismatch {
                expected: self.full_name().to_string(),
                actual: instance.descriptor().full_name().to_string(),
            })
        }
    }
}

impl From<MessageDescriptor> for MessageType {
    fn from(descriptor: MessageDescriptor) -> Self {
        Self::new(descriptor)
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.full_name())
    }
}

/// Merges `source` into `target` following protobuf merge rules:
/// set scalars overwrite, repeated fields append and nested messages merge.
pub fn merge(target: &mut DynamicMessage, source: &DynamicMessage) -> Result<(), DecodeError> {
    MessageType::new(target.descriptor()).check(source)?;

    let bytes = source.encode_to_vec();
    target.merge(bytes.as_slice())?;
    Ok(())
}

/// Encodes `message` as protobuf JSON (field names, not field numbers).
pub fn encode_json(message: &DynamicMessage, format: JsonFormat) -> Result<String, EncodeError> {
    let mut out = Vec::new();
    let options = format.options();

    let result = if format.pretty {
        let mut serializer = serde_json::Serializer::pretty(&mut out);
        message.serialize_with_options(&mut serializer, &options)
    } else {
        let mut serializer = serde_json::Serializer::new(&mut out);
        message.serialize_with_options(&mut serializer, &options)
    };

    result.map_err(|source| EncodeError::Json {
        name: message.descriptor().full_name().to_string(),
        source,
    })?;

    // serde_json only ever writes valid UTF-8
    Ok(String::from_utf8_lossy(&out).into_owned())
}
