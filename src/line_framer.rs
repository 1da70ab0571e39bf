const LINE_TERMINATOR: u8 = b'\n';

/// Reassembles newline delimited text out of arbitrarily sized byte chunks.
///
/// Bytes are buffered until a terminator arrives, so a UTF-8 sequence split
/// between two reads is decoded only once it is complete.
#[derive(Debug, Default)]
pub struct LineFramer {
    pending: Vec<u8>,
}

impl LineFramer {
    pub fn new() -> Self {
        Self {
            pending: Vec::with_capacity(256),
        }
    }

    /// Append a chunk and return every line it completed, terminator stripped.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        let mut lines = Vec::new();
        let mut rest = chunk;
        while let Some(position) = rest.iter().position(|byte| *byte == LINE_TERMINATOR) {
            self.pending.extend_from_slice(&rest[..position]);
            lines.push(decode(&self.pending));
            self.pending.clear();
            rest = &rest[position + 1..];
        }
        self.pending.extend_from_slice(rest);
        lines
    }

    /// Emit whatever is still pending at stream end, even without a terminator.
    pub fn finish(&mut self) -> String {
        let line = decode(&self.pending);
        self.pending.clear();
        line
    }

    #[cfg(test)]
    fn pending_len(&self) -> usize {
        self.pending.len()
    }
}

fn decode(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}
