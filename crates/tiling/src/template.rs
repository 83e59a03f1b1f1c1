use crate::address::TileAddress;
use crate::grid::ConfigError;

/// A tile URL with `{z}`, `{x}` and `{y}` placeholders.
///
/// Placeholder order in the URL is free: map servers publish
/// `.../tile/{z}/{y}/{x}` while XYZ providers use `{z}/{x}/{y}`. A single
/// host range such as `{1-4}` or `{a-c}` expands to one URL per host; each
/// tile is pinned to one of them by its address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TileUrlTemplate {
    raw: String,
    variants: Vec<String>,
}

impl TileUrlTemplate {
    pub fn new(template: impl Into<String>) -> Result<Self, ConfigError> {
        let raw = template.into();
        for placeholder in ["{z}", "{x}", "{y}"] {
            if !raw.contains(placeholder) {
                return Err(ConfigError::MissingPlaceholder(placeholder));
            }
        }
        let variants = expand_host_range(&raw);
        Ok(Self { raw, variants })
    }

    /// `{service_base}/tile/{z}/{y}/{x}`: the tiled map-server layout, rows before columns.
    pub fn map_server(service_base: &str) -> Self {
        let raw = format!("{}/tile/{{z}}/{{y}}/{{x}}", service_base.trim_end_matches('/'));
        Self {
            variants: vec![raw.clone()],
            raw,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn host_count(&self) -> usize {
        self.variants.len()
    }

    pub fn expand(&self, addr: TileAddress) -> String {
        let pick = (u64::from(addr.x) + u64::from(addr.y)) % self.variants.len() as u64;
        self.variants[pick as usize]
            .replace("{z}", &addr.z.to_string())
            .replace("{x}", &addr.x.to_string())
            .replace("{y}", &addr.y.to_string())
    }
}

/// Expands the first `{c1-c2}` range (single characters) into one string per
/// character. Templates without a range come back unchanged.
fn expand_host_range(template: &str) -> Vec<String> {
    let mut search_from = 0;
    while let Some(open) = template[search_from..].find('{').map(|i| i + search_from) {
        let Some(close) = template[open..].find('}').map(|i| i + open) else {
            break;
        };
        let inner: Vec<char> = template[open + 1..close].chars().collect();
        if let &[start, '-', end] = inner.as_slice()
            && start.is_ascii_alphanumeric()
            && end.is_ascii_alphanumeric()
            && start <= end
        {
            let (head, tail) = (&template[..open], &template[close + 1..]);
            return (start..=end).map(|c| format!("{head}{c}{tail}")).collect();
        }
        search_from = close + 1;
    }
    vec![template.to_string()]
}
