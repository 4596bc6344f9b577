/********************************************************************************
 * Copyright (c) 2026 Contributors to the Eclipse Foundation
 *
 * See the NOTICE file(s) distributed with this work for additional
 * information regarding copyright ownership.
 *
 * This program and the accompanying materials are made available under the
 * terms of the Apache License Version 2.0 which is available at
 * https://www.apache.org/licenses/LICENSE-2.0
 *
 * SPDX-License-Identifier: Apache-2.0
 ********************************************************************************/

//! Payload codec seam between descriptors and store node data.

use crate::description::EndpointDescription;
use crate::error::CodecError;

/// Turns descriptors into opaque node payloads and back.
///
/// The discovery engine never looks inside a payload; it only needs `decode(encode(d)) == d`.
pub trait DescriptionCodec: Send + Sync {
    fn encode(&self, description: &EndpointDescription) -> Result<Vec<u8>, CodecError>;
    fn decode(&self, payload: &[u8]) -> Result<EndpointDescription, CodecError>;
}

/// JSON object codec, one member per property.
#[derive(Clone, Copy, Debug, Default)]
pub struct JsonDescriptionCodec;

impl DescriptionCodec for JsonDescriptionCodec {
    fn encode(&self, description: &EndpointDescription) -> Result<Vec<u8>, CodecError> {
        serde_json::to_vec(description).map_err(CodecError::Encode)
    }

    fn decode(&self, payload: &[u8]) -> Result<EndpointDescription, CodecError> {
        serde_json::from_slice(payload).map_err(CodecError::Decode)
    }
}
