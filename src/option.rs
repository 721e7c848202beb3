// SPDX-License-Identifier: Apache-2.0

use crate::buffer::{Buffer, BufferMut};
use crate::{
    DhcpError, DhcpV6OptionIaAddr, DhcpV6OptionIaNa, DhcpV6OptionIaPd,
    DhcpV6OptionIaPrefix, DhcpV6OptionIaTa, DhcpV6OptionStatus, ErrorContext,
    ErrorKind,
};

#[derive(Debug, PartialEq, Eq, Clone, Copy, PartialOrd, Ord, Hash)]
#[non_exhaustive]
pub enum DhcpV6OptionCode {
    ClientId,
    ServerId,
    IANA,
    IATA,
    IAAddr,
    ORO,
    Preference,
    ElapsedTime,
    StatusCode,
    RapidCommit,
    UserClass,
    VendorClass,
    VendorOpts,
    ReconfAccept,
    DomainNameServers,
    DomainSearchList,
    IAPD,
    IAPrefix,
    NtpServer,
    Unicast,
    Unknown(u16),
}

const CODE_CLIENT_ID: u16 = 1;
const CODE_SERVER_ID: u16 = 2;
const CODE_IANA: u16 = 3;
const CODE_IATA: u16 = 4;
const CODE_IAADDR: u16 = 5;
const CODE_ORO: u16 = 6;
const CODE_PREFERENCE: u16 = 7;
const CODE_ELAPSED_TIME: u16 = 8;
const CODE_STATUS_CODE: u16 = 13;
const CODE_RAPID_COMMIT: u16 = 14;
const CODE_USER_CLASS: u16 = 15;
const CODE_VENDOR_CLASS: u16 = 16;
const CODE_VENDOR_OPTS: u16 = 17;
const CODE_RECONF_ACCEPT: u16 = 20;
const CODE_DOMAIN_NAME_SERVERS: u16 = 23;
const CODE_DOMAIN_SEARCH_LIST: u16 = 24;
const CODE_IAPD: u16 = 25;
const CODE_IAPREFIX: u16 = 26;
const CODE_NTP_SERVER: u16 = 56;
const CODE_UNICAST: u16 = 12;

impl std::fmt::Display for DhcpV6OptionCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                Self::ClientId => "client_id".to_string(),
                Self::ServerId => "server_id".to_string(),
                Self::IANA => "ia_na".to_string(),
                Self::IATA => "ia_ta".to_string(),
                Self::IAAddr => "ia_addr".to_string(),
                Self::ORO => "oro".to_string(),
                Self::Preference => "preference".to_string(),
                Self::ElapsedTime => "elapsed_time".to_string(),
                Self::StatusCode => "status_code".to_string(),
                Self::RapidCommit => "rapid_commit".to_string(),
                Self::UserClass => "user_class".to_string(),
                Self::VendorClass => "vendor_class".to_string(),
                Self::VendorOpts => "vendor_opts".to_string(),
                Self::ReconfAccept => "reconf_accept".to_string(),
                Self::DomainNameServers => "domain_name_servers".to_string(),
                Self::DomainSearchList => "domain_search_list".to_string(),
                Self::IAPD => "ia_pd".to_string(),
                Self::IAPrefix => "ia_prefix".to_string(),
                Self::NtpServer => "ntp_server".to_string(),
                Self::Unicast => "unicast".to_string(),
                Self::Unknown(c) => format!("unknown({c})"),
            }
        )
    }
}

impl From<DhcpV6OptionCode> for u16 {
    fn from(v: DhcpV6OptionCode) -> u16 {
        match v {
            DhcpV6OptionCode::ClientId => CODE_CLIENT_ID,
            DhcpV6OptionCode::ServerId => CODE_SERVER_ID,
            DhcpV6OptionCode::IANA => CODE_IANA,
            DhcpV6OptionCode::IATA => CODE_IATA,
            DhcpV6OptionCode::IAAddr => CODE_IAADDR,
            DhcpV6OptionCode::ORO => CODE_ORO,
            DhcpV6OptionCode::Preference => CODE_PREFERENCE,
            DhcpV6OptionCode::ElapsedTime => CODE_ELAPSED_TIME,
            DhcpV6OptionCode::StatusCode => CODE_STATUS_CODE,
            DhcpV6OptionCode::RapidCommit => CODE_RAPID_COMMIT,
            DhcpV6OptionCode::UserClass => CODE_USER_CLASS,
            DhcpV6OptionCode::VendorClass => CODE_VENDOR_CLASS,
            DhcpV6OptionCode::VendorOpts => CODE_VENDOR_OPTS,
            DhcpV6OptionCode::ReconfAccept => CODE_RECONF_ACCEPT,
            DhcpV6OptionCode::DomainNameServers => CODE_DOMAIN_NAME_SERVERS,
            DhcpV6OptionCode::DomainSearchList => CODE_DOMAIN_SEARCH_LIST,
            DhcpV6OptionCode::IAPD => CODE_IAPD,
            DhcpV6OptionCode::IAPrefix => CODE_IAPREFIX,
            DhcpV6OptionCode::NtpServer => CODE_NTP_SERVER,
            DhcpV6OptionCode::Unicast => CODE_UNICAST,
            DhcpV6OptionCode::Unknown(c) => c,
        }
    }
}

impl From<u16> for DhcpV6OptionCode {
    fn from(d: u16) -> Self {
        match d {
            CODE_CLIENT_ID => Self::ClientId,
            CODE_SERVER_ID => Self::ServerId,
            CODE_IANA => Self::IANA,
            CODE_IATA => Self::IATA,
            CODE_IAADDR => Self::IAAddr,
            CODE_ORO => Self::ORO,
            CODE_PREFERENCE => Self::Preference,
            CODE_ELAPSED_TIME => Self::ElapsedTime,
            CODE_STATUS_CODE => Self::StatusCode,
            CODE_RAPID_COMMIT => Self::RapidCommit,
            CODE_USER_CLASS => Self::UserClass,
            CODE_VENDOR_CLASS => Self::VendorClass,
            CODE_VENDOR_OPTS => Self::VendorOpts,
            CODE_RECONF_ACCEPT => Self::ReconfAccept,
            CODE_DOMAIN_NAME_SERVERS => Self::DomainNameServers,
            CODE_DOMAIN_SEARCH_LIST => Self::DomainSearchList,
            CODE_IAPD => Self::IAPD,
            CODE_IAPREFIX => Self::IAPrefix,
            CODE_NTP_SERVER => Self::NtpServer,
            CODE_UNICAST => Self::Unicast,
            _ => Self::Unknown(d),
        }
    }
}

#[derive(Debug, PartialEq, Eq, Clone)]
pub struct DhcpV6OptionUserClass {
    pub data: Vec<Vec<u8>>,
}

#[derive(Debug, PartialEq, Eq, Clone)]
pub struct DhcpV6OptionVendorClass {
    pub enterprise_number: u32,
    pub data: Vec<Vec<u8>>,
}

#[derive(Debug, PartialEq, Eq, Clone)]
pub struct DhcpV6OptionVendorOpts {
    pub enterprise_number: u32,
    pub data: Vec<u8>,
}

#[derive(Debug, PartialEq, Eq, Clone)]
pub struct DhcpV6OptionUnknown {
    pub code: u16,
    pub data: Vec<u8>,
}

/// Sum type of every option this crate emits or understands on the wire.
/// Options this crate has no use for (Relay-Msg, Authentication, Interface-Id,
/// Reconfigure-Message, Information-Refresh-Time) still round-trip through
/// `Unknown` rather than being rejected.
#[derive(Debug, PartialEq, Eq, Clone)]
#[non_exhaustive]
pub enum DhcpV6Option {
    ClientId(Vec<u8>),
    ServerId(Vec<u8>),
    IANA(DhcpV6OptionIaNa),
    IATA(DhcpV6OptionIaTa),
    IAAddr(DhcpV6OptionIaAddr),
    IAPD(DhcpV6OptionIaPd),
    IAPrefix(DhcpV6OptionIaPrefix),
    Oro(Vec<DhcpV6OptionCode>),
    Preference(u8),
    ElapsedTime(u16),
    StatusCode(DhcpV6OptionStatus),
    RapidCommit,
    UserClass(DhcpV6OptionUserClass),
    VendorClass(DhcpV6OptionVendorClass),
    VendorOpts(DhcpV6OptionVendorOpts),
    ReconfAccept,
    DnsServers(Vec<std::net::Ipv6Addr>),
    DomainList(Vec<String>),
    NtpServer(Vec<u8>),
    Unicast(Ipv6Addr),
    Unknown(DhcpV6OptionUnknown),
}

impl DhcpV6Option {
    pub fn code(&self) -> DhcpV6OptionCode {
        match self {
            Self::ClientId(_) => DhcpV6OptionCode::ClientId,
            Self::ServerId(_) => DhcpV6OptionCode::ServerId,
            Self::IANA(_) => DhcpV6OptionCode::IANA,
            Self::IATA(_) => DhcpV6OptionCode::IATA,
            Self::IAAddr(_) => DhcpV6OptionCode::IAAddr,
            Self::IAPD(_) => DhcpV6OptionCode::IAPD,
            Self::IAPrefix(_) => DhcpV6OptionCode::IAPrefix,
            Self::Oro(_) => DhcpV6OptionCode::ORO,
            Self::Preference(_) => DhcpV6OptionCode::Preference,
            Self::ElapsedTime(_) => DhcpV6OptionCode::ElapsedTime,
            Self::StatusCode(_) => DhcpV6OptionCode::StatusCode,
            Self::RapidCommit => DhcpV6OptionCode::RapidCommit,
            Self::UserClass(_) => DhcpV6OptionCode::UserClass,
            Self::VendorClass(_) => DhcpV6OptionCode::VendorClass,
            Self::VendorOpts(_) => DhcpV6OptionCode::VendorOpts,
            Self::ReconfAccept => DhcpV6OptionCode::ReconfAccept,
            Self::DnsServers(_) => DhcpV6OptionCode::DomainNameServers,
            Self::DomainList(_) => DhcpV6OptionCode::DomainSearchList,
            Self::NtpServer(_) => DhcpV6OptionCode::NtpServer,
            Self::Unicast(_) => DhcpV6OptionCode::Unicast,
            Self::Unknown(u) => DhcpV6OptionCode::Unknown(u.code),
        }
    }

    pub(crate) fn parse(buf: &mut Buffer) -> Result<Self, DhcpError> {
        let code: DhcpV6OptionCode = peek_u16_be(buf)?.into();
        Ok(match code {
            DhcpV6OptionCode::ClientId => {
                Self::ClientId(parse_opaque(buf, "OPTION_CLIENTID")?)
            }
            DhcpV6OptionCode::ServerId => {
                Self::ServerId(parse_opaque(buf, "OPTION_SERVERID")?)
            }
            DhcpV6OptionCode::IANA => Self::IANA(DhcpV6OptionIaNa::parse(buf)?),
            DhcpV6OptionCode::IATA => Self::IATA(DhcpV6OptionIaTa::parse(buf)?),
            DhcpV6OptionCode::IAAddr => {
                Self::IAAddr(DhcpV6OptionIaAddr::parse(buf)?)
            }
            DhcpV6OptionCode::IAPD => Self::IAPD(DhcpV6OptionIaPd::parse(buf)?),
            DhcpV6OptionCode::IAPrefix => {
                Self::IAPrefix(DhcpV6OptionIaPrefix::parse(buf)?)
            }
            DhcpV6OptionCode::ORO => {
                let (_, len) = consume_header(buf, DhcpV6OptionCode::ORO)?;
                let raw = buf.get_bytes(len.into()).context("OPTION_ORO")?;
                let mut inner = Buffer::new(raw);
                let mut codes = Vec::new();
                while !inner.is_empty() {
                    codes.push(
                        inner
                            .get_u16_be()
                            .context("OPTION_ORO entry")?
                            .into(),
                    );
                }
                Self::Oro(codes)
            }
            DhcpV6OptionCode::Preference => {
                let (_, _len) =
                    consume_header(buf, DhcpV6OptionCode::Preference)?;
                Self::Preference(
                    buf.get_u8().context("OPTION_PREFERENCE")?,
                )
            }
            DhcpV6OptionCode::ElapsedTime => {
                let (_, _len) =
                    consume_header(buf, DhcpV6OptionCode::ElapsedTime)?;
                Self::ElapsedTime(
                    buf.get_u16_be().context("OPTION_ELAPSED_TIME")?,
                )
            }
            DhcpV6OptionCode::StatusCode => {
                Self::StatusCode(DhcpV6OptionStatus::parse(buf)?)
            }
            DhcpV6OptionCode::RapidCommit => {
                consume_header(buf, DhcpV6OptionCode::RapidCommit)?;
                Self::RapidCommit
            }
            DhcpV6OptionCode::UserClass => {
                let (_, len) =
                    consume_header(buf, DhcpV6OptionCode::UserClass)?;
                let raw = buf.get_bytes(len.into()).context("OPTION_USER_CLASS")?;
                Self::UserClass(DhcpV6OptionUserClass {
                    data: split_length_prefixed(raw)?,
                })
            }
            DhcpV6OptionCode::VendorClass => {
                let (_, len) =
                    consume_header(buf, DhcpV6OptionCode::VendorClass)?;
                let raw =
                    buf.get_bytes(len.into()).context("OPTION_VENDOR_CLASS")?;
                let mut inner = Buffer::new(raw);
                let enterprise_number = inner
                    .get_u32_be()
                    .context("OPTION_VENDOR_CLASS enterprise number")?;
                Self::VendorClass(DhcpV6OptionVendorClass {
                    enterprise_number,
                    data: split_length_prefixed(inner.get_remains())?,
                })
            }
            DhcpV6OptionCode::VendorOpts => {
                let (_, len) =
                    consume_header(buf, DhcpV6OptionCode::VendorOpts)?;
                let raw =
                    buf.get_bytes(len.into()).context("OPTION_VENDOR_OPTS")?;
                let mut inner = Buffer::new(raw);
                let enterprise_number = inner
                    .get_u32_be()
                    .context("OPTION_VENDOR_OPTS enterprise number")?;
                Self::VendorOpts(DhcpV6OptionVendorOpts {
                    enterprise_number,
                    data: inner.get_remains().to_vec(),
                })
            }
            DhcpV6OptionCode::ReconfAccept => {
                consume_header(buf, DhcpV6OptionCode::ReconfAccept)?;
                Self::ReconfAccept
            }
            DhcpV6OptionCode::DomainNameServers => {
                let (_, len) = consume_header(
                    buf,
                    DhcpV6OptionCode::DomainNameServers,
                )?;
                let raw = buf
                    .get_bytes(len.into())
                    .context("OPTION_DNS_SERVERS")?;
                let mut inner = Buffer::new(raw);
                let mut addrs = Vec::new();
                while !inner.is_empty() {
                    addrs.push(
                        inner.get_ipv6().context("OPTION_DNS_SERVERS entry")?,
                    );
                }
                Self::DnsServers(addrs)
            }
            DhcpV6OptionCode::DomainSearchList => {
                let (_, len) = consume_header(
                    buf,
                    DhcpV6OptionCode::DomainSearchList,
                )?;
                let raw = buf
                    .get_bytes(len.into())
                    .context("OPTION_DOMAIN_LIST")?;
                Self::DomainList(parse_dns_search_list(raw)?)
            }
            DhcpV6OptionCode::NtpServer => {
                Self::NtpServer(parse_opaque(buf, "OPTION_NTP_SERVER")?)
            }
            DhcpV6OptionCode::Unicast => {
                let (_, len) = consume_header(buf, DhcpV6OptionCode::Unicast)?;
                let raw = buf.get_bytes(len.into()).context("OPTION_UNICAST")?;
                let mut inner = Buffer::new(raw);
                Self::Unicast(inner.get_ipv6().context("OPTION_UNICAST address")?)
            }
            DhcpV6OptionCode::Unknown(c) => {
                let (_, len) = consume_header(buf, DhcpV6OptionCode::Unknown(c))?;
                let data =
                    buf.get_bytes(len.into()).context("unknown option")?;
                Self::Unknown(DhcpV6OptionUnknown {
                    code: c,
                    data: data.to_vec(),
                })
            }
        })
    }

    pub(crate) fn emit(&self, buf: &mut BufferMut) {
        match self {
            Self::ClientId(d) => emit_opaque(buf, DhcpV6OptionCode::ClientId, d),
            Self::ServerId(d) => emit_opaque(buf, DhcpV6OptionCode::ServerId, d),
            Self::IANA(v) => v.emit(buf),
            Self::IATA(v) => v.emit(buf),
            Self::IAAddr(v) => v.emit(buf),
            Self::IAPD(v) => v.emit(buf),
            Self::IAPrefix(v) => v.emit(buf),
            Self::Oro(codes) => {
                let mut value_buf = BufferMut::new(codes.len() * 2);
                for c in codes {
                    value_buf.write_u16_be((*c).into());
                }
                emit_header(buf, DhcpV6OptionCode::ORO, value_buf.len());
                buf.write_bytes(&value_buf.data);
            }
            Self::Preference(v) => {
                emit_header(buf, DhcpV6OptionCode::Preference, 1);
                buf.write_u8(*v);
            }
            Self::ElapsedTime(v) => {
                emit_header(buf, DhcpV6OptionCode::ElapsedTime, 2);
                buf.write_u16_be(*v);
            }
            Self::StatusCode(v) => v.emit(buf),
            Self::RapidCommit => {
                emit_header(buf, DhcpV6OptionCode::RapidCommit, 0);
            }
            Self::UserClass(v) => {
                let mut value_buf = BufferMut::new(32);
                write_length_prefixed(&mut value_buf, &v.data);
                emit_header(buf, DhcpV6OptionCode::UserClass, value_buf.len());
                buf.write_bytes(&value_buf.data);
            }
            Self::VendorClass(v) => {
                let mut value_buf = BufferMut::new(32);
                value_buf.write_u32_be(v.enterprise_number);
                write_length_prefixed(&mut value_buf, &v.data);
                emit_header(buf, DhcpV6OptionCode::VendorClass, value_buf.len());
                buf.write_bytes(&value_buf.data);
            }
            Self::VendorOpts(v) => {
                let mut value_buf = BufferMut::new(32);
                value_buf.write_u32_be(v.enterprise_number);
                value_buf.write_bytes(&v.data);
                emit_header(buf, DhcpV6OptionCode::VendorOpts, value_buf.len());
                buf.write_bytes(&value_buf.data);
            }
            Self::ReconfAccept => {
                emit_header(buf, DhcpV6OptionCode::ReconfAccept, 0);
            }
            Self::DnsServers(addrs) => {
                let mut value_buf = BufferMut::new(addrs.len() * 16);
                for a in addrs {
                    value_buf.write_ipv6(*a);
                }
                emit_header(
                    buf,
                    DhcpV6OptionCode::DomainNameServers,
                    value_buf.len(),
                );
                buf.write_bytes(&value_buf.data);
            }
            Self::DomainList(names) => {
                let mut value_buf = BufferMut::new(32);
                emit_dns_search_list(&mut value_buf, names);
                emit_header(
                    buf,
                    DhcpV6OptionCode::DomainSearchList,
                    value_buf.len(),
                );
                buf.write_bytes(&value_buf.data);
            }
            Self::NtpServer(d) => emit_opaque(buf, DhcpV6OptionCode::NtpServer, d),
            Self::Unicast(addr) => {
                emit_header(buf, DhcpV6OptionCode::Unicast, 16);
                buf.write_ipv6(*addr);
            }
            Self::Unknown(u) => {
                emit_header(buf, DhcpV6OptionCode::Unknown(u.code), u.data.len());
                buf.write_bytes(&u.data);
            }
        }
    }
}

fn peek_u16_be(buf: &mut Buffer) -> Result<u16, DhcpError> {
    let mut probe = Buffer::new(buf.get_remains());
    probe.get_u16_be().context("peeking DHCPv6 option code")
}

fn consume_header(
    buf: &mut Buffer,
    expect: DhcpV6OptionCode,
) -> Result<(u16, u16), DhcpError> {
    let code = buf.get_u16_be().context("Invalid DHCPv6 option code")?;
    if code != expect.into() {
        return Err(DhcpError::new(
            ErrorKind::InvalidArgument,
            format!("Expecting DHCPv6 option {expect} code {}, got {code}", u16::from(expect)),
        ));
    }
    let len = buf.get_u16_be().context("Invalid DHCPv6 option len")?;
    Ok((code, len))
}

fn emit_header(buf: &mut BufferMut, code: DhcpV6OptionCode, len: usize) {
    buf.write_u16_be(code.into());
    buf.write_u16_be(len as u16);
}

fn parse_opaque(buf: &mut Buffer, ctx: &str) -> Result<Vec<u8>, DhcpError> {
    let code: DhcpV6OptionCode = buf
        .get_u16_be()
        .context("Invalid DHCPv6 option code")?
        .into();
    let len = buf.get_u16_be().context("Invalid DHCPv6 option len")?;
    let _ = code;
    Ok(buf.get_bytes(len.into()).context(ctx)?.to_vec())
}

fn emit_opaque(buf: &mut BufferMut, code: DhcpV6OptionCode, data: &[u8]) {
    emit_header(buf, code, data.len());
    buf.write_bytes(data);
}

fn split_length_prefixed(mut raw: &[u8]) -> Result<Vec<Vec<u8>>, DhcpError> {
    let mut out = Vec::new();
    while !raw.is_empty() {
        let mut b = Buffer::new(raw);
        let len: usize = b.get_u16_be().context("length-prefixed entry")?.into();
        let data = b.get_bytes(len).context("length-prefixed entry data")?.to_vec();
        let consumed = 2 + len;
        out.push(data);
        raw = &raw[consumed..];
    }
    Ok(out)
}

fn write_length_prefixed(buf: &mut BufferMut, entries: &[Vec<u8>]) {
    for e in entries {
        buf.write_u16_be(e.len() as u16);
        buf.write_bytes(e);
    }
}

/// RFC 1035 uncompressed label sequences, one per search domain, terminated
/// by a zero-length label.
fn parse_dns_search_list(raw: &[u8]) -> Result<Vec<String>, DhcpError> {
    let mut names = Vec::new();
    let mut i = 0usize;
    let mut labels: Vec<String> = Vec::new();
    while i < raw.len() {
        let len = raw[i] as usize;
        i += 1;
        if len == 0 {
            if !labels.is_empty() {
                names.push(labels.join("."));
                labels = Vec::new();
            }
            continue;
        }
        if i + len > raw.len() {
            return Err(DhcpError::new(
                ErrorKind::InvalidDhcpMessage,
                "Truncated DNS search list label".to_string(),
            ));
        }
        labels.push(
            String::from_utf8(raw[i..i + len].to_vec()).map_err(|e| {
                DhcpError::new(
                    ErrorKind::InvalidDhcpMessage,
                    format!("Non-UTF8 DNS search list label: {e}"),
                )
            })?,
        );
        i += len;
    }
    Ok(names)
}

fn emit_dns_search_list(buf: &mut BufferMut, names: &[String]) {
    for name in names {
        for label in name.split('.') {
            buf.write_u8(label.len() as u8);
            buf.write_bytes(label.as_bytes());
        }
        buf.write_u8(0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_emit_oro_round_trip() -> Result<(), DhcpError> {
        let raw = &[0x00, 0x06, 0x00, 0x04, 0x00, 0x17, 0x00, 0x18];
        let mut buf = Buffer::new(raw);
        let opt = DhcpV6Option::parse(&mut buf)?;
        assert_eq!(
            opt,
            DhcpV6Option::Oro(vec![
                DhcpV6OptionCode::DomainNameServers,
                DhcpV6OptionCode::DomainSearchList,
            ])
        );
        let mut out = BufferMut::new(8);
        opt.emit(&mut out);
        assert_eq!(out.data.as_slice(), raw);
        Ok(())
    }

    #[test]
    fn parse_rapid_commit_is_zero_length() -> Result<(), DhcpError> {
        let raw = &[0x00, 0x0e, 0x00, 0x00];
        let mut buf = Buffer::new(raw);
        let opt = DhcpV6Option::parse(&mut buf)?;
        assert_eq!(opt, DhcpV6Option::RapidCommit);
        Ok(())
    }

    #[test]
    fn parse_domain_search_list() -> Result<(), DhcpError> {
        let raw = &[
            0x00, 0x18, 0x00, 0x0d, 0x03, b'l', b'a', b'b', 0x05, b'l', b'o',
            b'c', b'a', b'l', 0x00,
        ];
        let mut buf = Buffer::new(raw);
        let opt = DhcpV6Option::parse(&mut buf)?;
        assert_eq!(opt, DhcpV6Option::DomainList(vec!["lab.local".to_string()]));
        Ok(())
    }
}
