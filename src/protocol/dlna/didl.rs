/// Escapes for use inside an XML text node.
pub fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

/// `http-get:*:<mime>:DLNA.ORG_FLAGS=...` per the DLNA content-features
/// convention; the flags value matches the one sent on `contentFeatures.dlna.org`
/// by the media server for the same content.
fn protocol_info_for(media_url: &str) -> String {
    let mime = mime_guess::from_path(media_url).first_or_octet_stream();
    format!("http-get:*:{}:DLNA.ORG_FLAGS=01700000000000000000000000000000", mime.essence_str())
}

/// Builds a DIDL-Lite `<item>` document for `media_url`, then escapes the
/// whole thing a second time so it can sit inside the `CurrentURIMetaData`
/// text node of the SetAVTransportURI SOAP body.
pub fn build_metadata(media_url: &str, title: &str) -> String {
    let didl = format!(
        r#"<DIDL-Lite xmlns="urn:schemas-upnp-org:metadata-1-0/DIDL-Lite/" xmlns:dc="http://purl.org/dc/elements/1.1/" xmlns:upnp="urn:schemas-upnp-org:metadata-1-0/upnp/"><item id="0" parentID="-1" restricted="1"><dc:title>{}</dc:title><res protocolInfo="{}">{}</res><upnp:class>object.item.videoItem</upnp:class></item></DIDL-Lite>"#,
        escape(title),
        protocol_info_for(media_url),
        escape(media_url)
    );
    escape(&didl)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_reserved_characters() {
        assert_eq!(escape("<a & b>"), "&lt;a &amp; b&gt;");
    }

    #[test]
    fn metadata_is_escaped_twice_for_soap_embedding() {
        let metadata = build_metadata("http://host/a.mp4", "My <Movie>");
        assert!(metadata.contains("&amp;lt;item") || metadata.starts_with("&lt;DIDL-Lite"));
        assert!(!metadata.contains("<item"));
    }

    #[test]
    fn title_special_characters_survive_round_trip_escaping() {
        let metadata = build_metadata("http://host/a.mp4", "Tom & Jerry");
        assert!(metadata.contains("Tom &amp;amp; Jerry"));
    }

    #[test]
    fn protocol_info_carries_actual_mime_and_dlna_flags() {
        assert_eq!(
            protocol_info_for("http://host/a.mp4"),
            "http-get:*:video/mp4:DLNA.ORG_FLAGS=01700000000000000000000000000000"
        );
    }
}
