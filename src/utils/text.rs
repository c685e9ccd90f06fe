//! 文本辅助函数

/// 取文本前 `max_chars` 个字符
///
/// 按字符而不是字节截断，不会切断多字节字符
pub fn excerpt(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((end, _)) => text[..end].to_string(),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_excerpt_counts_chars() {
        assert_eq!(excerpt("áéíóú", 3), "áéí");
        assert_eq!(excerpt("abc", 10), "abc");
        assert_eq!(excerpt("abc", 0), "");
    }
}
