//! Utility functions for the proxy pool.

use crate::proxy::Proxy;

use log::debug;

/// Parse newline-separated proxy entries.
///
/// Blank lines and `#` comments are skipped. Lines without a scheme are
/// treated as `http`. Lines that fail to parse are dropped.
pub fn parse_proxy_list(content: &str) -> Vec<Proxy> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| {
            let parsed = if line.contains("://") {
                line.parse::<Proxy>()
            } else {
                format!("http://{}", line).parse::<Proxy>()
            };
            match parsed {
                Ok(proxy) => Some(proxy),
                Err(e) => {
                    debug!("Ignoring proxy line {:?}: {}", line, e);
                    None
                }
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proxy::ProxyScheme;

    #[test]
    fn test_parse_proxy_list() {
        let content = "\
# free proxies
1.2.3.4:8080

https://u:p@proxy.example.com:443
socks5://5.6.7.8:1080
garbage
  10.0.0.1:3128
";
        let proxies = parse_proxy_list(content);
        assert_eq!(proxies.len(), 3);
        assert_eq!(proxies[0].endpoint(), "1.2.3.4:8080");
        assert_eq!(proxies[0].scheme(), ProxyScheme::Http);
        assert_eq!(proxies[1].scheme(), ProxyScheme::Https);
        assert_eq!(proxies[1].username(), Some("u"));
        assert_eq!(proxies[2].endpoint(), "10.0.0.1:3128");
    }
}
