#[macro_export]
macro_rules! print_result_err {
    ($context:expr, $result:expr $(,)?) => {{
        if let Err(err) = $result {
            log::error!("[{}:{}] Error {}: {:?}", ::std::file!(), ::std::line!(), $context, err);
        }
    }};
}

#[macro_export]
macro_rules! regex {
    ($re:literal $(,)?) => {{
        static RE: once_cell::sync::OnceCell<regex::Regex> = once_cell::sync::OnceCell::new();
        RE.get_or_init(|| regex::Regex::new($re).unwrap())
    }};
}

/// Strip a single trailing `\r` from a line, as emitted by backends that write CRLF.
pub fn trim_carriage_return(mut line: Vec<u8>) -> Vec<u8> {
    if line.last() == Some(&b'\r') {
        line.pop();
    }
    line
}

#[cfg(test)]
mod test {
    use super::trim_carriage_return;

    #[test]
    fn test_trim_carriage_return() {
        assert_eq!(trim_carriage_return(b"abc\r".to_vec()), b"abc".to_vec());
        assert_eq!(trim_carriage_return(b"abc".to_vec()), b"abc".to_vec());
        assert_eq!(trim_carriage_return(Vec::new()), Vec::<u8>::new());
    }
}
