fn parse_env_bool(var: &str) -> Option<bool> {
    std::env::var(var).ok().and_then(|value| {
        let normalized = value.trim().to_ascii_lowercase();
        match normalized.as_str() {
            "1" | "true" | "yes" | "on" | "enable" | "enabled" => Some(true),
            "0" | "false" | "no" | "off" | "disable" | "disabled" => Some(false),
            _ => None,
        }
    })
}

pub fn catalog_url_override() -> Option<String> {
    std::env::var("GALLERY_CATALOG_URL")
        .ok()
        .map(|url| url.trim().to_string())
        .filter(|url| !url.is_empty())
}

pub fn page_warmup() -> Option<bool> {
    parse_env_bool("GALLERY_PAGE_WARMUP")
}

pub fn empty_catalog_is_error() -> Option<bool> {
    parse_env_bool("GALLERY_EMPTY_IS_ERROR")
}
