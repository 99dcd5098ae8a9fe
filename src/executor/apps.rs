use std::collections::HashMap;

/// Display name → Android package id.
const BUILTIN_APPS: &[(&str, &str)] = &[
    ("Settings", "com.android.settings"),
    ("Chrome", "com.android.chrome"),
    ("Gmail", "com.google.android.gm"),
    ("Google Maps", "com.google.android.apps.maps"),
    ("YouTube", "com.google.android.youtube"),
    ("Clock", "com.google.android.deskclock"),
    ("Calendar", "com.google.android.calendar"),
    ("Contacts", "com.google.android.contacts"),
    ("Phone", "com.google.android.dialer"),
    ("Messages", "com.google.android.apps.messaging"),
    ("Photos", "com.google.android.apps.photos"),
    ("Play Store", "com.android.vending"),
    ("Files", "com.google.android.apps.nbu.files"),
    ("Camera", "com.android.camera2"),
    ("Calculator", "com.google.android.calculator"),
    ("WhatsApp", "com.whatsapp"),
    ("Telegram", "org.telegram.messenger"),
    ("Spotify", "com.spotify.music"),
    ("Instagram", "com.instagram.android"),
    ("X", "com.twitter.android"),
    ("WeChat", "com.tencent.mm"),
    ("微信", "com.tencent.mm"),
    ("QQ", "com.tencent.mobileqq"),
    ("Alipay", "com.eg.android.AlipayGphone"),
    ("支付宝", "com.eg.android.AlipayGphone"),
    ("Taobao", "com.taobao.taobao"),
    ("淘宝", "com.taobao.taobao"),
    ("JD", "com.jingdong.app.mall"),
    ("京东", "com.jingdong.app.mall"),
    ("Meituan", "com.sankuai.meituan"),
    ("美团", "com.sankuai.meituan"),
    ("Xiaohongshu", "com.xingin.xhs"),
    ("小红书", "com.xingin.xhs"),
    ("Douyin", "com.ss.android.ugc.aweme"),
    ("抖音", "com.ss.android.ugc.aweme"),
    ("Bilibili", "tv.danmaku.bili"),
    ("Weibo", "com.sina.weibo"),
    ("Amap", "com.autonavi.minimap"),
    ("高德地图", "com.autonavi.minimap"),
];

/// Lookup table used by `Launch` and by foreground-app reporting.
#[derive(Debug, Clone)]
pub struct AppRegistry {
    by_name: HashMap<String, String>,
}

impl AppRegistry {
    pub fn builtin() -> Self {
        Self::with_extra(&HashMap::new())
    }

    /// Built-ins plus `extra`; entries in `extra` win.
    pub fn with_extra(extra: &HashMap<String, String>) -> Self {
        let mut by_name: HashMap<String, String> = BUILTIN_APPS
            .iter()
            .map(|(name, pkg)| (name.to_string(), pkg.to_string()))
            .collect();
        by_name.extend(extra.iter().map(|(k, v)| (k.clone(), v.clone())));
        Self { by_name }
    }

    /// Exact name first, then case-insensitive. A value that already looks
    /// like a package id is passed through.
    pub fn package_for(&self, app: &str) -> Option<String> {
        let app = app.trim();
        if let Some(pkg) = self.by_name.get(app) {
            return Some(pkg.clone());
        }
        let lower = app.to_lowercase();
        if let Some((_, pkg)) = self.by_name.iter().find(|(k, _)| k.to_lowercase() == lower) {
            return Some(pkg.clone());
        }
        if self.by_name.values().any(|p| p == app) {
            return Some(app.to_string());
        }
        None
    }

    /// Display name for a package id; several names may share a package, the
    /// alphabetically first is returned so the answer is stable.
    pub fn name_for(&self, package: &str) -> Option<String> {
        self.by_name
            .iter()
            .filter(|(_, p)| p.as_str() == package)
            .map(|(name, _)| name.clone())
            .min()
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.by_name.keys().cloned().collect();
        names.sort();
        names
    }
}

impl Default for AppRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}
