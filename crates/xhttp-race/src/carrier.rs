use bytes::Bytes;

/// A cached H3 request handle, cloneable and safe to hold across requests.
pub type H3SendRequest = h3::client::SendRequest<h3_quinn::OpenStreams, Bytes>;
/// A cached H2 request handle.
pub type H2SendRequest = h2::client::SendRequest<Bytes>;

/// The winning transport for an authority, per spec §4.6's "install the
/// winner's connection into its pool".
#[derive(Clone)]
pub enum Carrier {
    H3(H3SendRequest),
    H2(H2SendRequest),
}

impl Carrier {
    #[must_use]
    pub fn is_h3(&self) -> bool {
        matches!(self, Self::H3(_))
    }
}

impl std::fmt::Debug for Carrier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::H3(_) => f.write_str("Carrier::H3"),
            Self::H2(_) => f.write_str("Carrier::H2"),
        }
    }
}
