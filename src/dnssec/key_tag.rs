/// Calculate the key tag of a DNSKEY from its RDATA (RFC 4034 Appendix B)
pub fn calculate_key_tag(rdata: &[u8]) -> u16 {
    // Algorithm 1 (RSAMD5) uses the low 16 bits of the modulus
    if rdata.get(3) == Some(&1) {
        let key = &rdata[4..];
        if key.len() >= 3 {
            return u16::from_be_bytes([key[key.len() - 3], key[key.len() - 2]]);
        }
        return 0;
    }

    let mut accumulator: u32 = 0;
    for (i, &byte) in rdata.iter().enumerate() {
        if i % 2 == 0 {
            accumulator += u32::from(byte) << 8;
        } else {
            accumulator += u32::from(byte);
        }
    }

    accumulator += accumulator >> 16;
    (accumulator & 0xFFFF) as u16
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rdata(flags: u16, algorithm: u8, public_key: &[u8]) -> Vec<u8> {
        let mut rdata = flags.to_be_bytes().to_vec();
        rdata.push(3);
        rdata.push(algorithm);
        rdata.extend_from_slice(public_key);
        rdata
    }

    #[test]
    fn test_key_tag_calculation() {
        // Test vector from RFC 4034 Appendix B.5
        let public_key = hex::decode(
            "030101a80020a95566ba42e886bb804cda84e47ef56dbd7aec612615552cec906d3e9b72dc4f90d3fc09b8e9d0ff2ae8ee5ed8cd61d7622c39ee2d76a2153bc0ac8b9e254125c46e0a224507fb358d7f6b5d7a42f75e60b9748e7c0747e2447f4bd7d10ca24bb1498de34a504406bbeb3b041fe48d0ad2b1de5adadb87d0c8824e7cc4dc3e5b7f0b3e8ac72c3d3d8aa7251abcaad82ad5ececed8cd83825d19ffd95e93bca729fdd88901b20fc598fb6a0779ddfa95e3e42ca9d0a7739d3c4ad3a7a5a30b3c60a73a6f09fdb812746e0d69edfba06754465f2e1dd5e3802e6d05bd6148e38fd8ca1632b71f6559fe9b6e18d73c5a750e3e2f2f205972e7b28ae04ddae5e27915a08d217db5ce090c119d23f79fb"
        ).unwrap();

        assert_eq!(calculate_key_tag(&rdata(0x0101, 5, &public_key)), 55495);
    }

    #[test]
    fn test_key_tag_rsamd5() {
        // Low-order bits come from the third- and second-to-last octets
        let public_key = vec![0x12, 0x34, 0x56, 0x78];
        assert_eq!(calculate_key_tag(&rdata(0x0101, 1, &public_key)), 0x3456);
    }

    #[test]
    fn test_key_tag_ignores_short_rsamd5_key() {
        assert_eq!(calculate_key_tag(&rdata(0x0100, 1, &[0x01])), 0);
    }
}
