//! Reply encoding for the Redis Serialization Protocol (RESP).

use bytes::{BufMut, Bytes, BytesMut};

/// A reply sent back to a client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RespValue {
    SimpleString(String),
    Error(String),
    Integer(i64),
    BulkString(Bytes),
    NullBulkString,
    Array(Vec<RespValue>),
}

impl RespValue {
    /// Encodes the value into its wire representation.
    ///
    /// # Examples
    ///
    /// ```
    /// use redis_aof::resp::RespValue;
    ///
    /// let encoded = RespValue::SimpleString("PONG".to_string()).encode();
    /// assert_eq!(&encoded[..], b"+PONG\r\n");
    /// ```
    pub fn encode(&self) -> Bytes {
        let mut buffer = BytesMut::new();
        self.encode_into(&mut buffer);
        buffer.freeze()
    }

    fn encode_into(&self, buffer: &mut BytesMut) {
        match self {
            RespValue::SimpleString(s) => {
                buffer.put_u8(b'+');
                buffer.put_slice(s.as_bytes());
                buffer.put_slice(b"\r\n");
            }
            RespValue::Error(msg) => {
                buffer.put_u8(b'-');
                buffer.put_slice(msg.as_bytes());
                buffer.put_slice(b"\r\n");
            }
            RespValue::Integer(i) => {
                buffer.put_slice(format!(":{}\r\n", i).as_bytes());
            }
            RespValue::BulkString(data) => {
                buffer.put_slice(format!("${}\r\n", data.len()).as_bytes());
                buffer.put_slice(data);
                buffer.put_slice(b"\r\n");
            }
            RespValue::NullBulkString => buffer.put_slice(b"$-1\r\n"),
            RespValue::Array(elements) => {
                buffer.put_slice(format!("*{}\r\n", elements.len()).as_bytes());
                for element in elements {
                    element.encode_into(buffer);
                }
            }
        }
    }
}
