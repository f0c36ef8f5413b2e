//! 请求目标与查询串解析
//!
//! 拆分 `<path>?<query>`，按 `&` / `=` 提取参数，并做 URL 解码。

/// 将请求目标拆分为路径与查询串
///
/// 只有恰好包含一个 `?` 时才返回 `Some`：`/greeting` 与 `/a?b?c` 都视为畸形。
/// `/greeting?` 合法，查询串为空。
pub fn split_target(target: &str) -> Option<(&str, &str)> {
    let mut parts = target.split('?');
    let path = parts.next()?;
    let query = parts.next()?;
    if parts.next().is_some() {
        return None;
    }
    Some((path, query))
}

/// 迭代查询串中的 `key=value` 对
///
/// 不含 `=` 的片段被跳过；键和值都保持原始（未解码）形式。
pub fn query_pairs(query: &str) -> impl Iterator<Item = (&str, &str)> {
    query
        .split('&')
        // 只按第一个 `=` 切分：`name=a=b` 的值是 `a=b`
        .filter_map(|pair| pair.split_once('='))
}

/// 查找第一个键为 `key` 的参数并解码其值
///
/// 键按原始形式比较，因此 `na%6De=x` 不会匹配 `name`。
pub fn find_param(query: &str, key: &str) -> Option<String> {
    query_pairs(query)
        .find(|(k, _)| *k == key)
        .map(|(_, v)| url_decode(v))
}

/// URL 解码
///
/// `%XX` 解码为对应字节，`+` 解码为空格，其他字符原样保留。
/// 后面不是两位十六进制数字的 `%` 原样保留；解码结果不是合法 UTF-8 时按有损方式替换。
pub fn url_decode(input: &str) -> String {
    let spaced = input.replace('+', " ");
    String::from_utf8_lossy(&urlencoding::decode_binary(spaced.as_bytes())).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_target() {
        assert_eq!(split_target("/greeting?name=World"), Some(("/greeting", "name=World")));
        assert_eq!(split_target("/greeting?"), Some(("/greeting", "")));
        assert_eq!(split_target("/greeting"), None);
        assert_eq!(split_target("/greeting?a=1?b=2"), None);
    }

    #[test]
    fn test_url_decode() {
        assert_eq!(url_decode("World"), "World");
        assert_eq!(url_decode("John%20Doe"), "John Doe");
        assert_eq!(url_decode("John+Doe"), "John Doe");
        assert_eq!(url_decode("%E4%BD%A0%E5%A5%BD"), "你好");
        assert_eq!(url_decode("a%2Bb"), "a+b");
        assert_eq!(url_decode("a%2bb"), "a+b");
    }

    #[test]
    fn test_url_decode_invalid_escape() {
        assert_eq!(url_decode("100%"), "100%");
        assert_eq!(url_decode("%zz"), "%zz");
        assert_eq!(url_decode("%4"), "%4");
        assert_eq!(url_decode("%ff"), "\u{FFFD}");
    }

    #[test]
    fn test_find_param_first_match_wins() {
        assert_eq!(find_param("name=a&name=b", "name"), Some("a".to_string()));
        assert_eq!(find_param("foo=bar&name=John%20Doe", "name"), Some("John Doe".to_string()));
        assert_eq!(find_param("name&name=x", "name"), Some("x".to_string()));
        assert_eq!(find_param("name=", "name"), Some(String::new()));
        assert_eq!(find_param("foo=bar", "name"), None);
        assert_eq!(find_param("", "name"), None);
    }

    #[test]
    fn test_find_param_raw_key_and_value_split() {
        assert_eq!(find_param("na%6De=x", "name"), None);
        assert_eq!(find_param("na%6De=x&name=y", "name"), Some("y".to_string()));
        assert_eq!(find_param("name=a=b", "name"), Some("a=b".to_string()));
        assert_eq!(find_param("name=a%3Db+c", "name"), Some("a=b c".to_string()));
    }
}
