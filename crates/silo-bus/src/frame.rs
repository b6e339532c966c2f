//! # Wire Frame Codec
//!
//! One bus message is an ordered sequence of frames with fixed positions:
//!
//! ```text
//! 0  address                      text
//! 1  message type / payload       text ("stop" is reserved) or encoded payload
//! 2  method handle                invocation only
//! 3  "ParameterCount:<n>"         invocation only
//! 4+ (type tag, value) * n        invocation only
//! ```
//!
//! Decoding is driven by [`decode_frame_at`], keyed by the frame's position so
//! the receiver can decode frames one at a time as they come off the channel,
//! without knowing how many frames the message has.

use crate::callback::token_arg;
use crate::error::{CodecError, DecodeFailure};
use crate::message::{
    is_stop, Arg, Envelope, Frame, Invocation, MethodHandle, DEPARTED_MESSAGE, INVOKE_MESSAGE,
    PARAMETER_COUNT_PREFIX, STOP_MESSAGE,
};
use crate::serializer::Serializer;
use serde::Serialize;

/// Address frame + text frame.
pub fn encode_simple_message(address: &str, text: &str, serializer: &Serializer) -> [Frame; 2] {
    [serializer.encode_string(address), serializer.encode_string(text)]
}

/// Address frame + serializer-encoded payload frame.
pub fn encode_typed_message<T: Serialize + ?Sized>(
    address: &str,
    payload: &T,
    serializer: &Serializer,
) -> Result<[Frame; 2], CodecError> {
    Ok([serializer.encode_string(address), serializer.encode(payload)?])
}

/// Address, `invoke` marker, handle, parameter count, then a type/value pair per argument.
pub fn encode_invocation(
    address: &str,
    handle: &MethodHandle,
    args: &[Arg],
    serializer: &Serializer,
) -> Result<Vec<Frame>, CodecError> {
    let mut frames = Vec::with_capacity(4 + 2 * args.len());
    frames.push(serializer.encode_string(address));
    frames.push(serializer.encode_string(INVOKE_MESSAGE));
    frames.push(serializer.encode_method_handle(handle)?);
    frames.push(serializer.encode_string(&format!("{PARAMETER_COUNT_PREFIX}{}", args.len())));
    for arg in args {
        let (tag, value) = serializer.encode_arg(arg)?;
        frames.push(tag);
        frames.push(value);
    }
    Ok(frames)
}

/// The control message that stops every actor whose filter matches `address`.
pub fn encode_stop(address: &str, serializer: &Serializer) -> [Frame; 2] {
    encode_simple_message(address, STOP_MESSAGE, serializer)
}

/// The notice a stopping actor publishes so the host can count departures.
pub fn encode_departure(address: &str, actor_id: &str, serializer: &Serializer) -> [Frame; 3] {
    [
        serializer.encode_string(address),
        serializer.encode_string(DEPARTED_MESSAGE),
        serializer.encode_string(actor_id),
    ]
}

/// What the caller should do after a frame decoded cleanly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameSignal {
    Continue,
    /// The message type is `stop`; the workload must not run for this message.
    Stop,
}

/// Partial result accumulated while frames of one message are decoded.
#[derive(Debug, Default)]
pub struct DecodeState {
    address: Option<String>,
    kind: Option<Frame>,
    message_type: Option<String>,
    handle: Option<MethodHandle>,
    declared: Option<usize>,
    expecting_type: bool,
    pending_tag: Option<String>,
    args: Vec<Arg>,
    body: Vec<Frame>,
}

impl DecodeState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn address(&self) -> Option<&str> {
        self.address.as_deref()
    }

    fn is_invocation(&self) -> bool {
        self.message_type.as_deref() == Some(INVOKE_MESSAGE)
    }

    /// The caller's callback token, if the arguments read so far end with one.
    pub fn callback_token(&self) -> Option<u64> {
        if self.is_invocation() {
            token_arg(&self.args)
        } else {
            None
        }
    }

    /// Completes the message once the channel reports no more frames.
    ///
    /// The declared parameter count is checked against the pairs actually read.
    /// A two-frame message is plain data even when its text is `invoke`.
    pub fn finish(self) -> Result<Envelope, CodecError> {
        let is_invocation = self.is_invocation();
        let address = self.address.ok_or(CodecError::Truncated("address"))?;
        let kind = self.kind.ok_or(CodecError::Truncated("message type"))?;

        let invocation = if is_invocation && self.handle.is_some() {
            let handle = self.handle.ok_or(CodecError::Truncated("method handle"))?;
            let declared = self.declared.ok_or(CodecError::Truncated("parameter count"))?;
            if let Some(tag) = self.pending_tag {
                return Err(CodecError::DanglingTypeTag(tag));
            }
            if declared != self.args.len() {
                return Err(CodecError::ParameterCountMismatch {
                    declared,
                    received: self.args.len(),
                });
            }
            Some(Invocation {
                handle,
                args: self.args,
            })
        } else {
            None
        };

        Ok(Envelope {
            address,
            kind,
            message_type: self.message_type,
            invocation,
            body: self.body,
        })
    }
}

/// Decodes the frame at position `index` into `state`.
pub fn decode_frame_at(
    index: usize,
    frame: &Frame,
    state: &mut DecodeState,
    serializer: &Serializer,
) -> Result<FrameSignal, CodecError> {
    match index {
        0 => {
            state.address = Some(serializer.decode_string(frame)?);
        }
        1 => {
            state.kind = Some(frame.clone());
            // Typed payloads need not be text; only a text frame can carry `stop`.
            state.message_type = serializer.decode_string(frame).ok();
            if state.message_type.as_deref().is_some_and(is_stop) {
                return Ok(FrameSignal::Stop);
            }
        }
        _ if !state.is_invocation() => {
            state.body.push(frame.clone());
        }
        2 => {
            state.handle = Some(serializer.decode_method_handle(frame)?);
        }
        3 => {
            let text = serializer.decode_string(frame)?;
            let count = text
                .strip_prefix(PARAMETER_COUNT_PREFIX)
                .and_then(|n| n.trim().parse::<usize>().ok())
                .ok_or_else(|| CodecError::MalformedParameterCount(text.clone()))?;
            state.declared = Some(count);
            state.expecting_type = true;
        }
        _ => {
            if state.expecting_type {
                state.pending_tag = Some(serializer.decode_string(frame)?);
                state.expecting_type = false;
            } else {
                let tag = state
                    .pending_tag
                    .take()
                    .ok_or(CodecError::Truncated("type tag"))?;
                state.args.push(serializer.decode_tagged(&tag, frame)?);
                state.expecting_type = true;
            }
        }
    }
    Ok(FrameSignal::Continue)
}

/// Outcome of decoding a complete frame sequence.
#[derive(Debug)]
pub enum Decoded {
    Stop { address: String },
    Message(Envelope),
}

/// Decodes an already-buffered message.
///
/// Same rules as the streaming path: a stop stops decoding, the first error
/// wins and is reported with its frame index.
pub fn decode_message(frames: &[Frame], serializer: &Serializer) -> Result<Decoded, DecodeFailure> {
    let mut state = DecodeState::new();
    for (index, frame) in frames.iter().enumerate() {
        match decode_frame_at(index, frame, &mut state, serializer) {
            Ok(FrameSignal::Continue) => {}
            Ok(FrameSignal::Stop) => {
                return Ok(Decoded::Stop {
                    address: state.address.unwrap_or_default(),
                })
            }
            Err(source) => return Err(DecodeFailure { index, source }),
        }
    }
    state
        .finish()
        .map(Decoded::Message)
        .map_err(|source| DecodeFailure {
            index: frames.len(),
            source,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Customer {
        firstname: String,
        lastname: String,
    }

    impl crate::message::WireType for Customer {
        const TYPE_TAG: &'static str = "Customer";
    }

    fn envelope(decoded: Decoded) -> Envelope {
        match decoded {
            Decoded::Message(envelope) => envelope,
            Decoded::Stop { .. } => panic!("unexpected stop"),
        }
    }

    #[test]
    fn test_simple_message() {
        let serializer = Serializer::json();
        let frames = encode_simple_message("XXXX", "hello its me", &serializer);
        let envelope = envelope(decode_message(&frames, &serializer).unwrap());
        assert_eq!(envelope.address, "XXXX");
        assert_eq!(envelope.message_type.as_deref(), Some("hello its me"));
        assert!(!envelope.is_invocation());
    }

    #[test]
    fn test_typed_message_keeps_raw_payload() {
        let serializer = Serializer::bincode();
        let customer = Customer {
            firstname: "John".into(),
            lastname: "Wilson".into(),
        };
        let frames = encode_typed_message("XXXXxxxx", &customer, &serializer).unwrap();
        let envelope = envelope(decode_message(&frames, &serializer).unwrap());
        let back: Customer = serializer.decode(&envelope.kind).unwrap();
        assert_eq!(back, customer);
    }

    #[test]
    fn test_invocation_layout() {
        let serializer = Serializer::json();
        let handle = MethodHandle::new("CustomerStore", "save");
        let customer = Customer {
            firstname: "John".into(),
            lastname: "Wilson".into(),
        };
        let args = vec![Arg::record(&customer, &serializer).unwrap(), Arg::Int(7)];
        let frames = encode_invocation("store", &handle, &args, &serializer).unwrap();
        assert_eq!(frames.len(), 4 + 2 * args.len());
        assert_eq!(&frames[1][..], b"invoke");
        assert_eq!(&frames[3][..], b"ParameterCount:2");

        let envelope = envelope(decode_message(&frames, &serializer).unwrap());
        let invocation = envelope.invocation.unwrap();
        assert_eq!(invocation.handle, handle);
        assert_eq!(invocation.args, args);
        assert_eq!(
            invocation.args[0].decode_record::<Customer>(&serializer).unwrap(),
            customer
        );
    }

    #[test]
    fn test_stop_any_case_short_circuits() {
        let serializer = Serializer::json();
        for word in ["stop", "STOP", "Stop"] {
            let mut frames = encode_simple_message("a", word, &serializer).to_vec();
            frames.push(Bytes::from_static(b"trailing"));
            match decode_message(&frames, &serializer).unwrap() {
                Decoded::Stop { address } => assert_eq!(address, "a"),
                Decoded::Message(_) => panic!("{word} did not stop"),
            }
        }
    }

    #[test]
    fn test_error_reports_frame_index() {
        let serializer = Serializer::json();
        let mut frames = encode_invocation("a", &MethodHandle::new("T", "m"), &[], &serializer).unwrap();
        frames[2] = Bytes::from_static(b"not a handle");
        let failure = decode_message(&frames, &serializer).unwrap_err();
        assert_eq!(failure.index, 2);
    }

    #[test]
    fn test_parameter_count_is_enforced() {
        let serializer = Serializer::json();
        let mut frames =
            encode_invocation("a", &MethodHandle::new("T", "m"), &[Arg::Int(1)], &serializer).unwrap();
        frames[3] = serializer.encode_string("ParameterCount:3");
        let failure = decode_message(&frames, &serializer).unwrap_err();
        assert!(matches!(
            failure.source,
            CodecError::ParameterCountMismatch {
                declared: 3,
                received: 1
            }
        ));
    }

    #[test]
    fn test_malformed_parameter_count() {
        let serializer = Serializer::json();
        let mut frames = encode_invocation("a", &MethodHandle::new("T", "m"), &[], &serializer).unwrap();
        frames[3] = serializer.encode_string("Count=0");
        let failure = decode_message(&frames, &serializer).unwrap_err();
        assert_eq!(failure.index, 3);
        assert!(matches!(failure.source, CodecError::MalformedParameterCount(_)));
    }

    #[test]
    fn test_dangling_type_tag() {
        let serializer = Serializer::json();
        let mut frames =
            encode_invocation("a", &MethodHandle::new("T", "m"), &[Arg::Int(1)], &serializer).unwrap();
        frames.pop();
        let failure = decode_message(&frames, &serializer).unwrap_err();
        assert!(matches!(failure.source, CodecError::DanglingTypeTag(_)));
    }

    #[test]
    fn test_truncated_message() {
        let serializer = Serializer::json();
        let frames = vec![serializer.encode_string("only-address")];
        let failure = decode_message(&frames, &serializer).unwrap_err();
        assert!(matches!(failure.source, CodecError::Truncated("message type")));
    }

    #[test]
    fn test_invoke_text_is_plain_data() {
        let serializer = Serializer::json();
        let frames = encode_simple_message("XXXX", "invoke", &serializer);
        let envelope = envelope(decode_message(&frames, &serializer).unwrap());
        assert_eq!(envelope.message_type.as_deref(), Some("invoke"));
        assert!(!envelope.is_invocation());
    }

    #[test]
    fn test_callback_token_survives_count_mismatch() {
        let serializer = Serializer::json();
        let mut frames =
            encode_invocation("a", &MethodHandle::new("T", "m"), &[Arg::Int(1), Arg::Int(9)], &serializer).unwrap();
        frames[3] = serializer.encode_string("ParameterCount:5");
        let mut state = DecodeState::new();
        for (index, frame) in frames.iter().enumerate() {
            decode_frame_at(index, frame, &mut state, &serializer).unwrap();
        }
        assert_eq!(state.callback_token(), Some(9));
        assert!(state.finish().is_err());
    }

    #[test]
    fn test_departure_notice() {
        let serializer = Serializer::json();
        let frames = encode_departure("silo.departures", "echo#1", &serializer);
        let envelope = envelope(decode_message(&frames, &serializer).unwrap());
        assert_eq!(envelope.message_type.as_deref(), Some(DEPARTED_MESSAGE));
        assert_eq!(&envelope.body[0][..], b"echo#1");
    }
}
