use std::io::{self, Write};
use tracing::{debug, info, warn};

use crate::{
    Config,
    error::{GeoError, Result},
    model::{GeoResult, Query},
    provider::{
        Endpoint, HttpTransport, Transport,
        openweather::{self, direct_params, reverse_params, zip_params},
    },
    render,
};

/// Turns city/state pairs and ZIP codes into coordinates.
#[derive(Debug)]
pub struct LocationResolver {
    transport: Box<dyn Transport>,
    limit: u8,
    country: String,
}

impl LocationResolver {
    pub fn new(config: &Config, transport: Box<dyn Transport>) -> Self {
        Self {
            transport,
            limit: config.limit,
            country: config.country.clone(),
        }
    }

    /// Resolver backed by the real API.
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let transport = HttpTransport::from_config(config)?;
        Ok(Self::new(config, Box::new(transport)))
    }

    /// Look up one location string.
    ///
    /// The result is always a list, even when the API answered with a bare
    /// object. API-reported failures come back as [`GeoResult::Error`].
    pub async fn resolve(&self, raw: &str) -> Result<Vec<GeoResult>> {
        let query = Query::parse(raw)?;

        let (endpoint, params) = match &query {
            Query::CityState { city, state, country } => {
                let country = country.as_deref().unwrap_or(&self.country);
                (Endpoint::Direct, direct_params(city, state, country, self.limit))
            }
            Query::Zip(code) => (Endpoint::Zip, zip_params(code, &self.country)),
        };

        let reply = self.transport.get(endpoint, &params).await?;
        openweather::decode(endpoint, raw, &reply)
    }

    /// State name for a coordinate pair, from the first reverse-geocoding hit.
    pub async fn resolve_state(&self, lat: f64, lon: f64) -> Result<String> {
        let label = format!("{lat}, {lon}");
        let reply = self
            .transport
            .get(Endpoint::Reverse, &reverse_params(lat, lon))
            .await?;

        let results = openweather::decode(Endpoint::Reverse, &label, &reply)?;

        results
            .into_iter()
            .next()
            .and_then(|first| match first {
                GeoResult::Location(record) => record.state,
                GeoResult::Error(_) => None,
            })
            .ok_or(GeoError::EmptyResult(label))
    }

    /// Reverse-geocode every location that came back without a state.
    ///
    /// A failed lookup leaves the state empty.
    pub async fn fill_states(&self, results: &mut [GeoResult]) {
        for result in results.iter_mut() {
            let GeoResult::Location(record) = result else {
                continue;
            };
            if record.state.is_some() {
                continue;
            }

            match self.resolve_state(record.lat, record.lon).await {
                Ok(state) => record.state = Some(state),
                Err(err) => warn!(name = %record.name, "state lookup failed: {err}"),
            }
        }
    }

    /// Fill missing states, then print each result.
    pub async fn render<W: Write>(
        &self,
        out: &mut W,
        query: &str,
        mut results: Vec<GeoResult>,
    ) -> io::Result<()> {
        self.fill_states(&mut results).await;
        render::write_results(out, query, &results)
    }

    /// Resolve and print each query in input order.
    ///
    /// Per-query failures are printed and skipped; only write errors stop the batch.
    pub async fn process<W, S>(&self, out: &mut W, queries: &[S]) -> io::Result<()>
    where
        W: Write,
        S: AsRef<str>,
    {
        let mut failed = 0usize;

        for query in queries {
            let query = query.as_ref();
            debug!(query, "resolving");

            match self.resolve(query).await {
                Ok(results) => {
                    if results.iter().any(|r| r.as_error().is_some()) {
                        failed += 1;
                    }
                    self.render(out, query, results).await?;
                }
                Err(GeoError::EmptyResult(_)) => {
                    failed += 1;
                    writeln!(out, "No data found for {query}.")?;
                }
                Err(err) => {
                    failed += 1;
                    warn!(query, "lookup failed: {err}");
                    writeln!(out, "Error: Unable to fetch data for {query}: {err}")?;
                }
            }
        }

        info!(total = queries.len(), failed, "finished processing locations");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::Reply;
    use async_trait::async_trait;
    use std::{
        collections::VecDeque,
        sync::{Arc, Mutex},
        time::Duration,
    };
    use tokio::{
        io::{AsyncReadExt, AsyncWriteExt},
        net::TcpListener,
        task::JoinHandle,
    };

    type Call = (Endpoint, Vec<(String, String)>);

    /// Replays canned replies in order and records every request.
    #[derive(Debug, Clone, Default)]
    struct FakeTransport {
        replies: Arc<Mutex<VecDeque<Reply>>>,
        calls: Arc<Mutex<Vec<Call>>>,
    }

    impl FakeTransport {
        fn reply(self, status: u16, body: &str) -> Self {
            self.replies.lock().unwrap().push_back(Reply {
                status,
                body: body.to_string(),
            });
            self
        }

        fn calls(&self) -> Vec<Call> {
            self.calls.lock().unwrap().clone()
        }

        fn count(&self, endpoint: Endpoint) -> usize {
            self.calls().iter().filter(|(e, _)| *e == endpoint).count()
        }
    }

    #[async_trait]
    impl Transport for FakeTransport {
        async fn get(&self, endpoint: Endpoint, params: &[(&str, String)]) -> Result<Reply> {
            let params = params.iter().map(|(k, v)| (k.to_string(), v.clone())).collect();
            self.calls.lock().unwrap().push((endpoint, params));

            Ok(self
                .replies
                .lock()
                .unwrap()
                .pop_front()
                .expect("unexpected request"))
        }
    }

    fn resolver(fake: &FakeTransport) -> LocationResolver {
        LocationResolver::new(&Config::default(), Box::new(fake.clone()))
    }

    fn params(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    async fn processed(resolver: &LocationResolver, queries: &[&str]) -> String {
        let mut out = Vec::new();
        resolver.process(&mut out, queries).await.unwrap();
        String::from_utf8(out).unwrap()
    }

    const SCHENECTADY: &str = r#"{"zip":"12345","name":"Schenectady","lat":42.8142,"lon":-73.9396,"country":"US"}"#;
    const SCHENECTADY_REVERSE: &str = r#"[{"name":"Schenectady","lat":42.8142,"lon":-73.9396,"country":"US","state":"New York"}]"#;
    const COLUMBUS: &str = r#"[{"name":"Columbus","local_names":{"en":"Columbus"},"lat":39.9622601,"lon":-83.0007065,"country":"US","state":"Ohio"}]"#;
    const CHICAGO: &str = r#"[{"name":"Chicago","lat":41.8755616,"lon":-87.6244212,"country":"US","state":"Illinois"}]"#;
    const NOT_FOUND: &str = r#"{"cod":"404","message":"not found"}"#;

    #[tokio::test]
    async fn known_zip_resolves_to_single_record() {
        let fake = FakeTransport::default().reply(200, SCHENECTADY);

        let results = resolver(&fake).resolve("12345").await.unwrap();

        assert_eq!(results.len(), 1);
        let record = results[0].as_location().expect("location record");
        assert_eq!(record.name, "Schenectady");
        assert_eq!(record.lat, 42.8142);
        assert_eq!(record.lon, -73.9396);
        assert_eq!(record.country, "US");

        assert_eq!(
            fake.calls(),
            vec![(Endpoint::Zip, params(&[("zip", "12345,US")]))]
        );
    }

    #[tokio::test]
    async fn city_state_query_expands_abbreviation() {
        let fake = FakeTransport::default().reply(200, COLUMBUS);

        let results = resolver(&fake).resolve("Columbus, OH").await.unwrap();

        let record = results[0].as_location().unwrap();
        assert_eq!(record.state.as_deref(), Some("Ohio"));
        assert_eq!(
            fake.calls(),
            vec![(
                Endpoint::Direct,
                params(&[("q", "Columbus,Ohio,US"), ("limit", "1")])
            )]
        );
    }

    #[tokio::test]
    async fn explicit_country_is_forwarded() {
        let fake = FakeTransport::default().reply(200, "[]");

        let err = resolver(&fake).resolve("Madison, WI, US").await.unwrap_err();

        assert!(matches!(err, GeoError::EmptyResult(_)));
        assert_eq!(fake.calls()[0].1[0], ("q".into(), "Madison,Wisconsin,US".into()));
    }

    #[tokio::test]
    async fn malformed_input_yields_error_record() {
        let fake = FakeTransport::default().reply(404, NOT_FOUND);

        let results = resolver(&fake).resolve(";;;;;").await.unwrap();

        let err = results[0].as_error().expect("error record");
        assert_eq!(err.code.to_string(), "404");
        assert_eq!(err.message, "not found");
    }

    #[tokio::test]
    async fn unknown_state_code_fails_without_request() {
        let fake = FakeTransport::default();

        let err = resolver(&fake).resolve("FakeCity, XX").await.unwrap_err();

        assert!(matches!(err, GeoError::InvalidStateCode(ref code) if code == "XX"));
        assert!(fake.calls().is_empty());
    }

    #[tokio::test]
    async fn server_error_is_upstream_failure() {
        let fake = FakeTransport::default().reply(500, "oops");

        let err = resolver(&fake).resolve("Madison, WI").await.unwrap_err();

        assert!(matches!(err, GeoError::Upstream { status: 500, endpoint: Endpoint::Direct, .. }));
    }

    #[tokio::test]
    async fn resolve_state_reads_first_result() {
        let fake = FakeTransport::default().reply(200, SCHENECTADY_REVERSE);

        let state = resolver(&fake).resolve_state(42.8142, -73.9396).await.unwrap();

        assert_eq!(state, "New York");
        assert_eq!(
            fake.calls(),
            vec![(
                Endpoint::Reverse,
                params(&[("lat", "42.8142"), ("lon", "-73.9396"), ("limit", "1")])
            )]
        );
    }

    #[tokio::test]
    async fn resolve_state_without_state_is_empty() {
        let fake = FakeTransport::default()
            .reply(200, r#"[{"name":"Atlantic","lat":0.0,"lon":0.0,"country":"XX"}]"#);

        let err = resolver(&fake).resolve_state(0.0, 0.0).await.unwrap_err();
        assert!(matches!(err, GeoError::EmptyResult(_)));
    }

    #[tokio::test]
    async fn render_fills_missing_state_with_one_reverse_call() {
        let fake = FakeTransport::default()
            .reply(200, SCHENECTADY)
            .reply(200, SCHENECTADY_REVERSE);
        let resolver = resolver(&fake);

        let mut results = resolver.resolve("12345").await.unwrap();
        resolver.fill_states(&mut results).await;

        assert_eq!(fake.count(Endpoint::Reverse), 1);
        assert_eq!(
            results[0].as_location().unwrap().state.as_deref(),
            Some("New York")
        );
    }

    #[tokio::test]
    async fn render_prints_filled_state() {
        let fake = FakeTransport::default()
            .reply(200, SCHENECTADY)
            .reply(200, SCHENECTADY_REVERSE);

        let text = processed(&resolver(&fake), &["12345"]).await;

        assert_eq!(
            text,
            "Location: Schenectady, New York\n\
             Latitude: 42.8142\n\
             Longitude: -73.9396\n\
             Country: US\n\
             ========================================\n"
        );
        assert_eq!(fake.count(Endpoint::Reverse), 1);
    }

    #[tokio::test]
    async fn render_skips_reverse_call_when_state_present() {
        let fake = FakeTransport::default().reply(200, COLUMBUS);

        processed(&resolver(&fake), &["Columbus, OH"]).await;

        assert_eq!(fake.count(Endpoint::Reverse), 0);
    }

    #[tokio::test]
    async fn failed_state_lookup_prints_unknown() {
        let fake = FakeTransport::default()
            .reply(200, SCHENECTADY)
            .reply(500, "");

        let text = processed(&resolver(&fake), &["12345"]).await;

        assert!(text.starts_with("Location: Schenectady, Unknown\n"));
        assert_eq!(fake.count(Endpoint::Reverse), 1);
    }

    #[tokio::test]
    async fn empty_batch_makes_no_requests() {
        let fake = FakeTransport::default();

        let text = processed(&resolver(&fake), &[]).await;

        assert!(text.is_empty());
        assert!(fake.calls().is_empty());
    }

    #[tokio::test]
    async fn batch_keeps_order_and_survives_failures() {
        let fake = FakeTransport::default()
            .reply(200, COLUMBUS)
            .reply(404, NOT_FOUND)
            .reply(200, "[]")
            .reply(200, CHICAGO);

        let text = processed(
            &resolver(&fake),
            &["Columbus, OH", ";;;;;", "Nowhere, TX", "Chicago, IL"],
        )
        .await;

        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "Location: Columbus, Ohio");
        assert_eq!(
            lines[5],
            "Error: Unable to fetch data for ;;;;;. Upstream reported 404: not found"
        );
        assert_eq!(lines[6], "No data found for Nowhere, TX.");
        assert_eq!(lines[7], "Location: Chicago, Illinois");
        assert_eq!(lines[8], "Latitude: 41.8755616");
        assert_eq!(fake.calls().len(), 4);
    }

    #[tokio::test]
    async fn invalid_state_code_is_reported_and_skipped() {
        let fake = FakeTransport::default().reply(200, CHICAGO);

        let text = processed(&resolver(&fake), &["Springfield, ZZ", "Chicago, IL"]).await;

        assert!(text.starts_with("Error: Unable to fetch data for Springfield, ZZ: Unknown state code 'ZZ'"));
        assert!(text.contains("Location: Chicago, Illinois"));
        assert_eq!(fake.calls().len(), 1);
    }

    #[tokio::test]
    async fn missing_api_key_reports_upstream_401() {
        let fake = FakeTransport::default().reply(401, INVALID_KEY);

        let text = processed(&resolver(&fake), &["yellow"]).await;

        assert_eq!(
            text,
            "Error: Unable to fetch data for yellow. Upstream reported 401: \
             Invalid API key. Please see https://openweathermap.org/faq#error401 for more info.\n"
        );
    }

    const SECRET: &str = "SECRETKEY123";
    const INVALID_KEY: &str = r#"{"cod":401,"message":"Invalid API key. Please see https://openweathermap.org/faq#error401 for more info."}"#;

    /// Answer a single HTTP request on a local port; yields the raw request text.
    async fn serve_once(status_line: &'static str, body: &'static str) -> (String, JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base_url = format!("http://{}/geo/1.0", listener.local_addr().unwrap());

        let server = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request: Vec<u8> = Vec::new();
            let mut buf = [0u8; 1024];
            while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                let n = socket.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                request.extend_from_slice(&buf[..n]);
            }

            let response = format!(
                "HTTP/1.1 {status_line}\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                body.len()
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            String::from_utf8_lossy(&request).into_owned()
        });

        (base_url, server)
    }

    #[tokio::test]
    async fn unconfigured_key_still_queries_and_prints_401() {
        let (base_url, server) = serve_once("401 Unauthorized", INVALID_KEY).await;
        let config = Config { base_url, ..Config::default() };

        let resolver = LocationResolver::from_config(&config).expect("missing key must not be fatal");
        let text = processed(&resolver, &["02135"]).await;
        let request = server.await.unwrap();

        assert!(request.starts_with("GET /geo/1.0/zip?zip=02135%2CUS&appid= "), "{request}");
        assert!(text.contains("Upstream reported 401: Invalid API key."), "{text}");
    }

    #[tokio::test]
    async fn upstream_error_output_hides_the_key() {
        let (base_url, server) = serve_once("403 Forbidden", "Forbidden").await;
        let transport = HttpTransport::new(base_url, SECRET.into(), Duration::from_secs(5)).unwrap();
        let resolver = LocationResolver::new(&Config::default(), Box::new(transport));

        let text = processed(&resolver, &["Madison,WI,US"]).await;
        let request = server.await.unwrap();

        assert!(request.contains(&format!("appid={SECRET}")), "{request}");
        assert_eq!(
            text,
            "Error: Unable to fetch data for Madison,WI,US: \
             OpenWeather direct request failed with status 403: Forbidden\n"
        );
    }

    #[tokio::test]
    async fn network_failure_output_hides_the_key_and_keeps_the_cause() {
        let transport = HttpTransport::new(
            "http://127.0.0.1:1/geo/1.0".into(),
            SECRET.into(),
            Duration::from_secs(2),
        )
        .unwrap();
        let resolver = LocationResolver::new(&Config::default(), Box::new(transport));

        let text = processed(&resolver, &["12345", "Columbus, OH"]).await;

        assert!(!text.contains(SECRET), "{text}");
        assert!(!text.contains("appid"), "{text}");
        assert!(text.contains("Unable to fetch data for 12345: Failed to send request to OpenWeather (zip)"));
        assert!(text.contains("Unable to fetch data for Columbus, OH: Failed to send request to OpenWeather (direct)"));
        // The bare reqwest message is followed by at least one cause.
        assert!(text.contains("error sending request: "), "{text}");
        assert!(text.to_lowercase().contains("connect"), "{text}");
    }

    #[tokio::test]
    async fn query_with_too_many_parts_is_reported_without_request() {
        let fake = FakeTransport::default();

        let text = processed(&resolver(&fake), &["a, OH, US, extra"]).await;

        assert!(text.starts_with("Error: Unable to fetch data for a, OH, US, extra: Cannot parse"));
        assert!(fake.calls().is_empty());
    }
}
