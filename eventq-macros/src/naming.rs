const EVENT_SUFFIX: &str = "Event";

/// 由类型名推导事件名：去掉 `Event` 后缀（类型名恰为 `Event` 时保留），再转 snake_case
pub(crate) fn default_event_name(type_name: &str) -> String {
    let base = match type_name.strip_suffix(EVENT_SUFFIX) {
        Some(stem) if !stem.is_empty() => stem,
        _ => type_name,
    };
    to_snake_case(base)
}

/// `HTTPRequestFailed` -> `http_request_failed`
pub(crate) fn to_snake_case(name: &str) -> String {
    let chars: Vec<char> = name.chars().collect();
    let mut out = String::with_capacity(name.len() + 4);
    for (i, &c) in chars.iter().enumerate() {
        if c.is_uppercase() {
            let prev = i.checked_sub(1).map(|j| chars[j]);
            let next = chars.get(i + 1).copied();
            let boundary = match prev {
                None | Some('_') => false,
                Some(p) if p.is_lowercase() || p.is_ascii_digit() => true,
                Some(_) => next.is_some_and(char::is_lowercase),
            };
            if boundary {
                out.push('_');
            }
            out.extend(c.to_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}

/// 与 `eventq_domain::partition::Priority` 的规则保持一致
pub(crate) fn check_priority_label(label: &str) -> Result<(), &'static str> {
    if label.is_empty() {
        return Err("priority must not be empty");
    }
    if label.len() > 64 {
        return Err("priority longer than 64 characters");
    }
    if !label
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        return Err("priority may only contain [A-Za-z0-9_-]");
    }
    Ok(())
}
