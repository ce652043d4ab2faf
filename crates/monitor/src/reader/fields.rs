//! 구분자 기반 한 줄 분할
//!
//! RFC 4180 인용 규칙을 한 줄 범위에서 지원합니다.
//! - 큰따옴표로 시작하는 필드는 구분자를 포함할 수 있음
//! - 인용 필드 내부의 `""`는 큰따옴표 하나로 해석
//! - 인용되지 않은 필드 중간의 큰따옴표는 문자 그대로 유지
//!
//! 여러 줄에 걸친 인용 필드는 지원하지 않으며, 닫히지 않은 인용은 에러입니다.

/// 한 줄을 필드 목록으로 분할합니다.
///
/// 줄 끝의 `\r`은 호출 전에 제거되어 있어야 합니다.
pub fn split_fields(line: &str, delimiter: char) -> Result<Vec<String>, String> {
    let mut fields = Vec::new();
    let mut field = String::new();
    let mut field_started = false;
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        if in_quotes {
            if c == '"' {
                if chars.peek() == Some(&'"') {
                    field.push('"');
                    chars.next();
                } else {
                    in_quotes = false;
                }
            } else {
                field.push(c);
            }
            continue;
        }

        if c == delimiter {
            fields.push(std::mem::take(&mut field));
            field_started = false;
            continue;
        }

        if c == '"' && !field_started {
            in_quotes = true;
        } else {
            field.push(c);
        }
        field_started = true;
    }

    if in_quotes {
        return Err("unterminated quoted field".to_owned());
    }

    fields.push(field);
    Ok(fields)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_plain_fields() {
        let fields = split_fields("1700000000,Error,com.app", ',').unwrap();
        assert_eq!(fields, vec!["1700000000", "Error", "com.app"]);
    }

    #[test]
    fn keeps_empty_fields() {
        let fields = split_fields(",a,,", ',').unwrap();
        assert_eq!(fields, vec!["", "a", "", ""]);
    }

    #[test]
    fn quoted_field_with_delimiter_and_escape() {
        let fields = split_fields(r#"1,"timeout, retry ""3""",x"#, ',').unwrap();
        assert_eq!(fields, vec!["1", r#"timeout, retry "3""#, "x"]);
    }

    #[test]
    fn quote_inside_unquoted_field_is_literal() {
        let fields = split_fields(r#"ab"c,d"#, ',').unwrap();
        assert_eq!(fields, vec![r#"ab"c"#, "d"]);
    }

    #[test]
    fn unterminated_quote_is_error() {
        assert!(split_fields(r#"1,"open,2"#, ',').is_err());
    }

    #[test]
    fn custom_delimiter() {
        let fields = split_fields("a;b,c;d", ';').unwrap();
        assert_eq!(fields, vec!["a", "b,c", "d"]);
    }
}
