//! Hello-message wire codec for subscription-aware routers (spec §6).
//!
//! Frame: 2-byte big-endian length prefix over a body of node address (4B),
//! hello sequence id (4B), a 2-byte subscription-id count followed by that
//! many 4-byte ids, and a 2-byte recent-message-id count followed by that
//! many 4-byte ids. The count prefixes are this codec's own framing choice
//! (the spec names the fields but not a delimiter for the two variable-length
//! lists); see DESIGN.md.

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hello {
    pub node_address: u32,
    pub sequence_id: u32,
    pub subscription_ids: Vec<u32>,
    pub recent_message_ids: Vec<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeError {
    TooShort,
    LengthMismatch { declared: usize, actual: usize },
}

pub fn encode(hello: &Hello) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(&hello.node_address.to_be_bytes());
    body.extend_from_slice(&hello.sequence_id.to_be_bytes());

    body.extend_from_slice(&(hello.subscription_ids.len() as u16).to_be_bytes());
    for id in &hello.subscription_ids {
        body.extend_from_slice(&id.to_be_bytes());
    }

    body.extend_from_slice(&(hello.recent_message_ids.len() as u16).to_be_bytes());
    for id in &hello.recent_message_ids {
        body.extend_from_slice(&id.to_be_bytes());
    }

    let mut out = Vec::with_capacity(2 + body.len());
    out.extend_from_slice(&(body.len() as u16).to_be_bytes());
    out.extend_from_slice(&body);
    out
}

pub fn decode(bytes: &[u8]) -> Result<Hello, DecodeError> {
    if bytes.len() < 2 {
        return Err(DecodeError::TooShort);
    }
    let declared = u16::from_be_bytes([bytes[0], bytes[1]]) as usize;
    let body = &bytes[2..];
    if body.len() != declared {
        return Err(DecodeError::LengthMismatch { declared, actual: body.len() });
    }
    if body.len() < 12 {
        return Err(DecodeError::TooShort);
    }

    let node_address = u32::from_be_bytes(body[0..4].try_into().unwrap());
    let sequence_id = u32::from_be_bytes(body[4..8].try_into().unwrap());
    let mut offset = 8;

    let sub_count = u16::from_be_bytes([body[offset], body[offset + 1]]) as usize;
    offset += 2;
    let mut subscription_ids = Vec::with_capacity(sub_count);
    for _ in 0..sub_count {
        if offset + 4 > body.len() {
            return Err(DecodeError::TooShort);
        }
        subscription_ids.push(u32::from_be_bytes(body[offset..offset + 4].try_into().unwrap()));
        offset += 4;
    }

    if offset + 2 > body.len() {
        return Err(DecodeError::TooShort);
    }
    let recent_count = u16::from_be_bytes([body[offset], body[offset + 1]]) as usize;
    offset += 2;
    let mut recent_message_ids = Vec::with_capacity(recent_count);
    for _ in 0..recent_count {
        if offset + 4 > body.len() {
            return Err(DecodeError::TooShort);
        }
        recent_message_ids.push(u32::from_be_bytes(body[offset..offset + 4].try_into().unwrap()));
        offset += 4;
    }

    Ok(Hello { node_address, sequence_id, subscription_ids, recent_message_ids })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_a_typical_hello() {
        let hello = Hello { node_address: 7, sequence_id: 42, subscription_ids: vec![1, 2, 3], recent_message_ids: vec![100, 200] };
        let bytes = encode(&hello);
        assert_eq!(decode(&bytes).unwrap(), hello);
    }

    #[test]
    fn round_trips_empty_lists() {
        let hello = Hello { node_address: 1, sequence_id: 0, subscription_ids: vec![], recent_message_ids: vec![] };
        let bytes = encode(&hello);
        assert_eq!(decode(&bytes).unwrap(), hello);
    }

    #[test]
    fn rejects_truncated_frame() {
        let hello = Hello { node_address: 1, sequence_id: 0, subscription_ids: vec![9], recent_message_ids: vec![] };
        let mut bytes = encode(&hello);
        bytes.truncate(bytes.len() - 2);
        assert!(decode(&bytes).is_err());
    }

    #[test]
    fn rejects_length_mismatch() {
        let hello = Hello { node_address: 1, sequence_id: 0, subscription_ids: vec![], recent_message_ids: vec![] };
        let mut bytes = encode(&hello);
        bytes[1] += 5; // corrupt the declared length
        assert!(matches!(decode(&bytes), Err(DecodeError::LengthMismatch { .. })));
    }
}
