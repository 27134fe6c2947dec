//! Active-mode command formatting (PORT for IPv4, EPRT for IPv6).

use std::net::{IpAddr, Ipv4Addr};

pub fn format_port_command(ip: Ipv4Addr, port: u16) -> String {
    let o = ip.octets();
    format!(
        "PORT {},{},{},{},{},{}",
        o[0],
        o[1],
        o[2],
        o[3],
        port / 256,
        port % 256
    )
}

pub fn format_eprt_command(ip: IpAddr, port: u16) -> String {
    let af = match ip {
        IpAddr::V4(_) => 1,
        IpAddr::V6(_) => 2,
    };
    format!("EPRT |{}|{}|{}|", af, ip, port)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv6Addr;

    #[test]
    fn test_port_command() {
        let cmd = format_port_command(Ipv4Addr::new(192, 168, 1, 5), 1781);
        assert_eq!(cmd, "PORT 192,168,1,5,6,245");
    }

    #[test]
    fn test_eprt_command_v6() {
        let ip = IpAddr::V6(Ipv6Addr::new(0x2001, 0xdb8, 0, 0, 0, 0, 0, 1));
        assert_eq!(format_eprt_command(ip, 54321), "EPRT |2|2001:db8::1|54321|");
    }

    #[test]
    fn test_eprt_command_v4() {
        let ip = IpAddr::V4(Ipv4Addr::new(10, 0, 0, 2));
        assert_eq!(format_eprt_command(ip, 20), "EPRT |1|10.0.0.2|20|");
    }
}
