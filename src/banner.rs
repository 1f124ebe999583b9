//! Startup banner for `positron watch`.

/// Session configuration for display in the startup banner.
pub struct BannerInfo<'a> {
    pub backend: &'a str,
    pub auth_status: &'a str,
    pub db: &'a str,
    pub resources: &'a [&'a str],
}

/// Print the startup banner with session info.
pub fn print_banner(info: &BannerInfo) {
    print!("{}", banner_text(info));
}

pub fn banner_text(info: &BannerInfo) -> String {
    let resources = if info.resources.is_empty() {
        "none".to_string()
    } else {
        info.resources.join(", ")
    };
    format!(
        r#"
   positron {}

   backend   {}
   auth      {}
   db        {}
   watching  {}

"#,
        env!("CARGO_PKG_VERSION"),
        info.backend,
        info.auth_status,
        info.db,
        resources,
    )
}

/// Show only the first and last few characters of a token.
pub fn mask_token(token: &str) -> String {
    let chars: Vec<char> = token.chars().collect();
    if chars.len() <= 12 {
        return "*".repeat(chars.len());
    }
    let head: String = chars[..4].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{head}…{tail}")
}
