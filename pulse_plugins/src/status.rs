/// HTTP status bucket: leading digit of the code plus "xx".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatusClass {
    Success,
    Redirection,
    ClientError,
    ServerError,
}

impl StatusClass {
    pub const ALL: [StatusClass; 4] = [
        StatusClass::Success,
        StatusClass::Redirection,
        StatusClass::ClientError,
        StatusClass::ServerError,
    ];

    /// Buckets a response status. A missing (or zero) status counts as 2xx;
    /// leading digits outside 2-5 have no bucket.
    pub fn from_status(status: Option<u16>) -> Option<Self> {
        let mut leading = match status {
            None | Some(0) => return Some(StatusClass::Success),
            Some(code) => code,
        };

        while leading >= 10 {
            leading /= 10;
        }

        match leading {
            2 => Some(StatusClass::Success),
            3 => Some(StatusClass::Redirection),
            4 => Some(StatusClass::ClientError),
            5 => Some(StatusClass::ServerError),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            StatusClass::Success => "2xx",
            StatusClass::Redirection => "3xx",
            StatusClass::ClientError => "4xx",
            StatusClass::ServerError => "5xx",
        }
    }

    /// Whether response times are recorded for this bucket.
    pub fn is_timed(&self) -> bool {
        matches!(self, StatusClass::Success | StatusClass::Redirection)
    }

    pub(crate) fn index(&self) -> usize {
        match self {
            StatusClass::Success => 0,
            StatusClass::Redirection => 1,
            StatusClass::ClientError => 2,
            StatusClass::ServerError => 3,
        }
    }
}

impl std::fmt::Display for StatusClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}
