//! Typed lookups shared by the system and per-server resolvers

use cfddns_core::{RecordType, Resolution};
use hickory_resolver::proto::ProtoErrorKind;
use hickory_resolver::proto::op::ResponseCode;
use hickory_resolver::{ResolveError, ResolveErrorKind, TokioResolver};
use std::net::IpAddr;

/// First address of `record_type` published for `fqdn`
///
/// A negative answer (NOERROR without records, or NXDOMAIN) is
/// `Resolution::Empty`. Every other failure, including SERVFAIL and REFUSED,
/// is returned as the resolver error.
pub(crate) async fn first_address(
    resolver: &TokioResolver,
    fqdn: &str,
    record_type: RecordType,
) -> Result<Resolution, ResolveError> {
    let found = match record_type {
        RecordType::A => resolver
            .ipv4_lookup(fqdn)
            .await
            .map(|l| l.iter().next().map(|a| IpAddr::V4(a.0))),
        RecordType::Aaaa => resolver
            .ipv6_lookup(fqdn)
            .await
            .map(|l| l.iter().next().map(|a| IpAddr::V6(a.0))),
    };

    match found {
        Ok(Some(ip)) => Ok(Resolution::Address(ip)),
        Ok(None) => Ok(Resolution::Empty),
        Err(e) if is_negative_answer(&e) => Ok(Resolution::Empty),
        Err(e) => Err(e),
    }
}

/// hickory reports every answer without records as `NoRecordsFound`; only
/// NOERROR and NXDOMAIN mean the server actually answered
fn is_negative_answer(e: &ResolveError) -> bool {
    match e.kind() {
        ResolveErrorKind::Proto(proto) => matches!(
            proto.kind(),
            ProtoErrorKind::NoRecordsFound { response_code, .. }
                if matches!(response_code, ResponseCode::NoError | ResponseCode::NXDomain)
        ),
        _ => false,
    }
}
