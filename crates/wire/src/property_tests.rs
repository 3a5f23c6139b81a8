// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Property tests for the frame codec.

use crate::{decode, encode, AgentMessage, OrchestratorMessage};
use proptest::prelude::*;

proptest! {
    #[test]
    fn chunk_frames_round_trip(
        bytes in proptest::collection::vec(any::<u8>(), 0..4096),
        offset in any::<u64>(),
    ) {
        let msg = AgentMessage::ArtifactChunk {
            job_id: "J1".into(),
            artifact_id: "art-prop".into(),
            offset,
            bytes,
        };
        let frame = encode(&msg).unwrap();
        let back: AgentMessage = decode(&frame[4..]).unwrap();
        prop_assert_eq!(back, msg);
    }

    #[test]
    fn ack_frames_round_trip(offset in any::<u64>()) {
        let msg = OrchestratorMessage::ArtifactAck {
            artifact_id: "art-prop".into(),
            offset,
        };
        let frame = encode(&msg).unwrap();
        let back: OrchestratorMessage = decode(&frame[4..]).unwrap();
        prop_assert_eq!(back, msg);
    }

    #[test]
    fn decode_never_panics_on_arbitrary_payloads(
        payload in proptest::collection::vec(any::<u8>(), 0..512),
    ) {
        let _ = decode::<AgentMessage>(&payload);
    }
}
