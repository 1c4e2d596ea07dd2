use dashmap::DashMap;
use reqwest::{Client, Proxy};
use std::time::Duration;

#[cfg(not(any(feature = "tls-native", feature = "tls-rustls")))]
compile_error!("one TLS backend feature must be enabled: `tls-native` or `tls-rustls`");

pub fn apply_tls_backend(builder: reqwest::ClientBuilder) -> reqwest::ClientBuilder {
    #[cfg(all(feature = "tls-rustls", not(feature = "tls-native")))]
    {
        return builder.use_rustls_tls();
    }
    #[cfg(feature = "tls-native")]
    {
        builder
    }
}

/// Hands out one `reqwest::Client` per (proxy, user-agent) pair. Accounts
/// sharing both reuse the same connection pool.
pub struct ClientCache {
    timeout: Duration,
    clients: DashMap<(Option<String>, String), Client>,
}

impl ClientCache {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            clients: DashMap::new(),
        }
    }

    pub fn client_for(&self, proxy: Option<&str>, user_agent: &str) -> Result<Client, String> {
        let key = (proxy.map(str::to_string), user_agent.to_string());
        if let Some(client) = self.clients.get(&key) {
            return Ok(client.clone());
        }

        let mut builder = apply_tls_backend(Client::builder())
            .timeout(self.timeout)
            .user_agent(user_agent);

        match proxy {
            Some(url) => {
                let proxy = Proxy::all(url).map_err(|e| format!("invalid_proxy_url: {}: {}", url, e))?;
                tracing::debug!("[Http] Route: proxy {}", url);
                builder = builder.proxy(proxy);
            }
            None => {
                tracing::debug!("[Http] Route: direct");
            }
        }

        let client = builder
            .build()
            .map_err(|e| format!("failed_to_build_http_client: {}", e))?;
        self.clients.insert(key, client.clone());
        Ok(client)
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}
