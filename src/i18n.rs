// ==========================================
// 国际化 (i18n) 模块
// ==========================================
// 使用 rust-i18n 库
// 支持英文（默认）、中文、法文
// ==========================================
// 注意: rust_i18n::i18n! 宏已在 lib.rs 中初始化
// 注意: 导入流程只使用显式 locale 翻译，不修改进程级全局 locale
// ==========================================

use std::sync::{Arc, RwLock};

/// 默认语言
pub const DEFAULT_LOCALE: &str = "en";

/// 规范化语言代码
///
/// # 规则
/// 1. `fr_FR` → `fr-FR`
/// 2. 若该语言已提供翻译文件，直接使用
/// 3. 否则退化到语言前缀（`fr-FR` → `fr`）
/// 4. 仍不可用时返回默认语言
pub fn normalize_locale(locale: &str) -> String {
    let normalized = locale.trim().replace('_', "-");
    if normalized.is_empty() {
        return DEFAULT_LOCALE.to_string();
    }

    let available = rust_i18n::available_locales!();
    if available.iter().any(|l| l.eq_ignore_ascii_case(&normalized)) {
        return available
            .iter()
            .find(|l| l.eq_ignore_ascii_case(&normalized))
            .map(|l| l.to_string())
            .unwrap_or(normalized);
    }

    let language = normalized.split('-').next().unwrap_or_default();
    available
        .iter()
        .find(|l| l.eq_ignore_ascii_case(language))
        .map(|l| l.to_string())
        .unwrap_or_else(|| DEFAULT_LOCALE.to_string())
}

/// 按指定语言翻译消息（无参数）
///
/// # 示例
/// ```no_run
/// use sheet_import::i18n::tr;
/// let msg = tr("common.success", "en");
/// ```
pub fn tr(key: &str, locale: &str) -> String {
    rust_i18n::t!(key, locale = locale).to_string()
}

/// 按指定语言翻译消息（带参数）
///
/// # 示例
/// ```no_run
/// use sheet_import::i18n::tr_with_args;
/// let msg = tr_with_args("import.file_not_found", "en", &[("path", "/tmp/test.csv")]);
/// ```
pub fn tr_with_args(key: &str, locale: &str, args: &[(&str, &str)]) -> String {
    let mut result = tr(key, locale);
    for (k, v) in args {
        let placeholder = format!("%{{{}}}", k);
        result = result.replace(&placeholder, v);
    }
    result
}

// ==========================================
// LocaleHandle - 单次导入内的活动语言
// ==========================================
// 用途: 代替进程级 locale 切换，只在单个导入上下文内生效
#[derive(Debug, Clone)]
pub struct LocaleHandle {
    active: Arc<RwLock<String>>,
}

impl LocaleHandle {
    pub fn new(locale: &str) -> Self {
        Self {
            active: Arc::new(RwLock::new(normalize_locale(locale))),
        }
    }

    /// 当前活动语言
    pub fn current(&self) -> String {
        match self.active.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn replace(&self, locale: String) -> String {
        let mut guard = match self.active.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        std::mem::replace(&mut *guard, locale)
    }

    /// 切换活动语言，返回的守卫在离开作用域时恢复原语言
    ///
    /// 提前返回、`?` 传播错误、panic 展开都会触发恢复。
    pub fn scope(&self, locale: &str) -> LocaleScope {
        let previous = self.replace(normalize_locale(locale));
        LocaleScope {
            handle: self.clone(),
            previous: Some(previous),
        }
    }

    /// 使用当前活动语言翻译
    pub fn tr(&self, key: &str) -> String {
        tr(key, &self.current())
    }

    /// 使用当前活动语言翻译（带参数）
    pub fn tr_with_args(&self, key: &str, args: &[(&str, &str)]) -> String {
        tr_with_args(key, &self.current(), args)
    }
}

/// 语言作用域守卫
#[derive(Debug)]
pub struct LocaleScope {
    handle: LocaleHandle,
    previous: Option<String>,
}

impl LocaleScope {
    /// 进入作用域前的语言
    pub fn previous(&self) -> Option<&str> {
        self.previous.as_deref()
    }
}

impl Drop for LocaleScope {
    fn drop(&mut self) {
        if let Some(previous) = self.previous.take() {
            self.handle.replace(previous);
        }
    }
}
