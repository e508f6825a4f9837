use std::io::{self, Write};

/// Tags every line of child output with its task name.
///
/// Writes are buffered until a newline arrives, so interleaved tasks can
/// never split a line between them; whatever remains in the buffer is
/// emitted on flush (the supervisor flushes before it reports an exit).
pub struct PrefixedWriter<W> {
    prefix: String,
    out: W,
    buffer: Vec<u8>,
}

impl<W: Write> PrefixedWriter<W> {
    pub fn new(prefix: String, out: W) -> Self {
        Self {
            prefix,
            out,
            buffer: Vec::new(),
        }
    }

    fn emit_complete_lines(&mut self) -> io::Result<()> {
        while let Some(newline) = self.buffer.iter().position(|&b| b == b'\n') {
            let rest = self.buffer.split_off(newline + 1);
            let line = std::mem::replace(&mut self.buffer, rest);
            self.out.write_all(self.prefix.as_bytes())?;
            self.out.write_all(&line)?;
        }
        Ok(())
    }
}

impl<W: Write> Write for PrefixedWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buffer.extend_from_slice(buf);
        self.emit_complete_lines()?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        if !self.buffer.is_empty() {
            self.buffer.push(b'\n');
            self.emit_complete_lines()?;
        }
        self.out.flush()
    }
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;

    use super::*;

    fn collect(writes: &[&str]) -> String {
        let mut sink = Vec::new();
        {
            let mut writer = PrefixedWriter::new("app | ".to_string(), &mut sink);
            for chunk in writes {
                writer.write_all(chunk.as_bytes()).unwrap();
            }
            writer.flush().unwrap();
        }
        String::from_utf8(sink).unwrap()
    }

    #[test]
    fn test_prefixes_each_line() {
        assert_eq!(
            collect(&["one\ntwo\n"]),
            "app | one\napp | two\n"
        );
    }

    #[test]
    fn test_partial_lines_are_held_back() {
        assert_eq!(collect(&["par", "tial\n"]), "app | partial\n");
    }

    #[test]
    fn test_flush_completes_a_dangling_line() {
        assert_eq!(collect(&["no newline"]), "app | no newline\n");
    }

    #[test]
    fn test_empty_write_emits_nothing() {
        assert_eq!(collect(&[""]), "");
    }
}
