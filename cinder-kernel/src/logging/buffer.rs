//! Fixed-capacity line buffer
//!
//! Log lines are formatted on the stack so logging never touches the heap
//! and a whole line reaches the console in one write.

use core::fmt;

/// Stack buffer for formatting one message
pub struct MessageBuffer<const N: usize> {
    data: [u8; N],
    len: usize,
    truncated: bool,
}

impl<const N: usize> MessageBuffer<N> {
    pub const fn new() -> Self {
        Self {
            data: [0u8; N],
            len: 0,
            truncated: false,
        }
    }

    pub fn as_str(&self) -> &str {
        // Only whole characters are ever copied in
        core::str::from_utf8(&self.data[..self.len]).unwrap_or("<invalid>")
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Whether anything was dropped for lack of space
    pub fn is_truncated(&self) -> bool {
        self.truncated
    }

    /// Overwrite the final byte with a newline if the line was cut short
    pub fn terminate_line(&mut self) {
        if self.truncated && self.len > 0 {
            // Step back to a char boundary so the newline replaces a whole char
            let mut end = self.len - 1;
            while end > 0 && !is_char_boundary(self.data[end]) {
                end -= 1;
            }
            self.data[end] = b'\n';
            self.len = end + 1;
        }
    }
}

impl<const N: usize> Default for MessageBuffer<N> {
    fn default() -> Self {
        Self::new()
    }
}

fn is_char_boundary(byte: u8) -> bool {
    // Continuation bytes are 0b10xx_xxxx
    (byte as i8) >= -0x40
}

impl<const N: usize> fmt::Write for MessageBuffer<N> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        let remaining = N - self.len;
        let mut to_copy = s.len().min(remaining);
        while !s.is_char_boundary(to_copy) {
            to_copy -= 1;
        }
        if to_copy < s.len() {
            self.truncated = true;
        }
        self.data[self.len..self.len + to_copy].copy_from_slice(&s.as_bytes()[..to_copy]);
        self.len += to_copy;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::fmt::Write;

    #[test]
    fn test_formats_into_stack() {
        let mut buf = MessageBuffer::<32>::new();
        write!(buf, "core {} up", 3).unwrap();
        assert_eq!(buf.as_str(), "core 3 up");
        assert!(!buf.is_truncated());
    }

    #[test]
    fn test_truncates_at_capacity() {
        let mut buf = MessageBuffer::<8>::new();
        write!(buf, "0123456789").unwrap();
        assert_eq!(buf.as_str(), "01234567");
        assert!(buf.is_truncated());
        buf.terminate_line();
        assert_eq!(buf.as_str(), "0123456\n");
    }

    #[test]
    fn test_never_splits_a_character() {
        let mut buf = MessageBuffer::<5>::new();
        write!(buf, "ab\u{e9}\u{e9}").unwrap();
        assert_eq!(buf.as_str(), "ab\u{e9}");
        assert_eq!(buf.len(), 4);
        buf.terminate_line();
        assert_eq!(buf.as_str(), "ab\n");
    }

    #[test]
    fn test_complete_line_left_alone() {
        let mut buf = MessageBuffer::<16>::new();
        writeln!(buf, "ok").unwrap();
        buf.terminate_line();
        assert_eq!(buf.as_str(), "ok\n");
    }
}
