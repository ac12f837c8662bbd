//! 支持的输出语言
//!
//! key 是写进提示词的语言代码，value 是界面上展示的本地名称

use phf::phf_ordered_map;

/// 语言代码 → 本地名称
pub static SUPPORTED_LANGUAGES: phf::OrderedMap<&'static str, &'static str> = phf_ordered_map! {
    "English" => "English",
    "Spanish" => "Español",
    "French" => "Français",
    "German" => "Deutsch",
    "Japanese" => "日本語",
    "Korean" => "한국어",
    "Portuguese" => "Português",
    "Chinese (Simplified)" => "简体中文",
    "Vietnamese" => "Tiếng Việt",
};

/// 默认输出语言
pub const DEFAULT_LANGUAGE: &str = "English";

/// 是否为支持的语言代码
pub fn is_supported(code: &str) -> bool {
    SUPPORTED_LANGUAGES.contains_key(code)
}

/// 获取语言的本地名称
pub fn native_name(code: &str) -> Option<&'static str> {
    SUPPORTED_LANGUAGES.get(code).copied()
}
