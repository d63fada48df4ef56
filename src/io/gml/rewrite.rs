use std::borrow::Cow;
use std::io::{BufRead, Write};

use quick_xml::events::attributes::Attribute;
use quick_xml::events::{BytesEnd, BytesStart, Event};
use quick_xml::name::{Namespace, QName, ResolveResult};
use quick_xml::{NsReader, Writer};
use tracing::warn;

use crate::config::ConvertConfig;
use crate::error::{Gml2WktError, GmlError, Result};

use super::{is_gml, validate_gml, GmlValidator, GML_NS};

/// GML for which engines affected by the multipoint bug return `MULTIPOINT Z EMPTY`.
pub const MULTIPOINT_BUG_PROBE: &str = concat!(
    r#"<gml:MultiPoint xmlns:gml="http://www.opengis.net/gml/3.2" "#,
    r#"gml:id="DOB.545058.X" srsName="urn:ogc:def:crs:EPSG::2065" srsDimension="2">"#,
    r#"<gml:pointMembers><gml:Point gml:id="DOB.545058.1">"#,
    r#"<gml:pos>496547.00 1139895.00</gml:pos>"#,
    r#"</gml:Point></gml:pointMembers></gml:MultiPoint>"#,
);

/// Interprets the engine's text rendering of [`MULTIPOINT_BUG_PROBE`].
///
/// Returns `true` when the engine lost the points, i.e. the workaround is needed.
#[must_use]
pub fn has_multipoint_bug(probe_as_text: &str) -> bool {
    probe_as_text.trim().eq_ignore_ascii_case("MULTIPOINT Z EMPTY")
}

/// Copies a GML element tree from a live XML stream into a standalone document.
///
/// The output declares the `gml` prefix on its root and writes every GML
/// element and attribute with that prefix. With the multipoint workaround
/// enabled, `pointMembers` wrappers below a `MultiPoint` are dropped and each
/// of their `Point` children gets its own `pointMember` wrapper instead.
#[derive(Debug, Clone, Copy)]
pub struct GmlRewriter {
    multipoint_bug_workaround: bool,
    ignore_invalid_gml: bool,
}

/// A namespace prefix (empty for the default namespace) bound to a URI.
type Binding = (Vec<u8>, Vec<u8>);

/// State carried from a parent element to its children.
#[derive(Debug, Clone, Copy)]
struct Frame {
    is_root: bool,
    in_multipoint: bool,
}

impl GmlRewriter {
    #[must_use]
    pub fn new(config: &ConvertConfig) -> Self {
        Self {
            multipoint_bug_workaround: config.multipoint_bug_workaround,
            ignore_invalid_gml: config.ignore_invalid_gml,
        }
    }

    /// Rewrites the element tree starting at `start` and checks it if requested.
    ///
    /// In tolerant mode (`ignore_invalid_gml`) the result is offered to the
    /// validator, and `Ok(None)` is returned when it is rejected. Otherwise
    /// the validator is not consulted.
    ///
    /// # Errors
    ///
    /// Returns an error if the stream cannot be read, contains events other
    /// than elements and text, or the validator fails.
    pub fn rewrite<R: BufRead>(
        &self,
        reader: &mut NsReader<R>,
        start: &BytesStart<'_>,
        validator: Option<&mut dyn GmlValidator>,
    ) -> Result<Option<String>> {
        let gml = self.write_document(reader, start)?;

        if !self.ignore_invalid_gml {
            return Ok(Some(gml));
        }
        let Some(validator) = validator else {
            warn!("tolerant mode without a GML validator, returning GML unchecked");
            return Ok(Some(gml));
        };

        match validate_gml(validator, &gml) {
            Ok(()) => Ok(Some(gml)),
            Err(Gml2WktError::Gml(GmlError::InvalidGml { gml })) => {
                warn!(%gml, "invalid GML, geometry skipped");
                Ok(None)
            }
            Err(err) => Err(err),
        }
    }

    /// Rewrites the element tree starting at `start` into a GML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the stream cannot be read or contains events other
    /// than elements and text.
    pub fn write_document<R: BufRead>(
        &self,
        reader: &mut NsReader<R>,
        start: &BytesStart<'_>,
    ) -> Result<String> {
        let mut writer = Writer::new(Vec::with_capacity(1_024));
        let frame = Frame {
            is_root: true,
            in_multipoint: false,
        };
        self.write_element_tree(reader, &mut writer, start, false, frame, &mut Vec::new())?;

        String::from_utf8(writer.into_inner())
            .map_err(|err| std::io::Error::new(std::io::ErrorKind::InvalidData, err).into())
    }

    fn write_element_tree<R: BufRead, W: Write>(
        &self,
        reader: &mut NsReader<R>,
        writer: &mut Writer<W>,
        start: &BytesStart<'_>,
        self_closing: bool,
        frame: Frame,
        scope: &mut Vec<Binding>,
    ) -> Result<()> {
        let scope_len = scope.len();
        let (ns, local) = reader.resolve_element(start.name());
        let in_gml = is_gml(&ns);
        let local = local.as_ref();
        let cur_is_multipoint = in_gml && local == b"MultiPoint";
        let workaround = self.multipoint_bug_workaround && frame.in_multipoint && in_gml;
        let ignore_point_members = workaround && local == b"pointMembers";
        let multipoint_point = workaround && local == b"Point";
        let name = if in_gml {
            format!("gml:{}", String::from_utf8_lossy(local))
        } else {
            String::from_utf8_lossy(start.name().as_ref()).into_owned()
        };

        if !ignore_point_members {
            if multipoint_point {
                writer.write_event(Event::Start(BytesStart::new("gml:pointMember")))?;
            }
            let element = copy_start(reader, start, &name, in_gml, frame.is_root, scope)?;
            if self_closing {
                writer.write_event(Event::Empty(element))?;
            } else {
                writer.write_event(Event::Start(element))?;
            }
        }

        if !self_closing {
            let child_frame = Frame {
                is_root: false,
                in_multipoint: frame.in_multipoint || cur_is_multipoint,
            };
            let mut buf = Vec::new();
            loop {
                buf.clear();
                match reader.read_event_into(&mut buf)? {
                    Event::Start(child) => {
                        self.write_element_tree(reader, writer, &child, false, child_frame, scope)?;
                    }
                    Event::Empty(child) => {
                        self.write_element_tree(reader, writer, &child, true, child_frame, scope)?;
                    }
                    Event::Text(text) => writer.write_event(Event::Text(text))?,
                    Event::End(_) => {
                        if !ignore_point_members {
                            writer.write_event(Event::End(BytesEnd::new(name.as_str())))?;
                        }
                        break;
                    }
                    Event::Eof => return Err(GmlError::UnexpectedEof.into()),
                    other => return Err(GmlError::UnsupportedXmlEvent(event_kind(&other)).into()),
                }
            }
        }

        if multipoint_point {
            writer.write_event(Event::End(BytesEnd::new("gml:pointMember")))?;
        }
        scope.truncate(scope_len);
        Ok(())
    }
}

/// Builds the output start tag: the `gml` binding on the root, then the
/// source attributes with GML ones re-prefixed. Values are copied still escaped.
///
/// Non-GML prefixes used by the element or its attributes are declared again
/// when `scope` (the bindings already written by output ancestors) lacks them,
/// so the subtree stays namespace-complete on its own.
fn copy_start<'n, R>(
    reader: &NsReader<R>,
    start: &BytesStart<'_>,
    name: &'n str,
    in_gml: bool,
    is_root: bool,
    scope: &mut Vec<Binding>,
) -> Result<BytesStart<'n>> {
    let mut element = BytesStart::new(name);
    if is_root {
        element.push_attribute(("xmlns:gml", GML_NS));
    }

    let mut used = Vec::new();
    if !in_gml {
        let (ns, _) = reader.resolve_element(start.name());
        if let Some(uri) = namespace_uri(&ns) {
            let prefix = start.name().prefix().map(|p| p.as_ref().to_vec());
            used.push((prefix.unwrap_or_default(), uri));
        }
    }

    for attr in start.attributes() {
        let attr = attr?;
        let key = attr.key.as_ref();
        if key == b"xmlns" || key == b"xmlns:gml" {
            continue;
        }
        if let Some(prefix) = key.strip_prefix(b"xmlns:") {
            scope.push((prefix.to_vec(), attr.value.to_vec()));
            element.push_attribute(attr);
            continue;
        }

        let (ns, local) = reader.resolve_attribute(attr.key);
        let key: Cow<'_, [u8]> = if is_gml(&ns) {
            let mut qualified = b"gml:".to_vec();
            qualified.extend_from_slice(local.as_ref());
            Cow::Owned(qualified)
        } else {
            if let (Some(prefix), Some(uri)) = (attr.key.prefix(), namespace_uri(&ns)) {
                if prefix.as_ref() != b"xml" {
                    used.push((prefix.as_ref().to_vec(), uri));
                }
            }
            Cow::Borrowed(key)
        };
        element.push_attribute(Attribute {
            key: QName(&key),
            value: attr.value,
        });
    }

    for (prefix, uri) in used {
        let current = scope
            .iter()
            .rev()
            .find(|(p, _)| *p == prefix)
            .map_or(&[][..], |(_, u)| u.as_slice());
        if current == uri.as_slice() {
            continue;
        }
        let mut key = b"xmlns".to_vec();
        if !prefix.is_empty() {
            key.push(b':');
            key.extend_from_slice(&prefix);
        }
        element.push_attribute(Attribute {
            key: QName(&key),
            value: Cow::Borrowed(uri.as_slice()),
        });
        scope.push((prefix, uri));
    }
    Ok(element)
}

/// Returns the URI a name resolved to, empty for no namespace.
fn namespace_uri(ns: &ResolveResult<'_>) -> Option<Vec<u8>> {
    match ns {
        ResolveResult::Bound(Namespace(uri)) => Some(uri.to_vec()),
        ResolveResult::Unbound => Some(Vec::new()),
        ResolveResult::Unknown(_) => None,
    }
}

fn event_kind(event: &Event<'_>) -> String {
    match event {
        Event::CData(_) => "CDATA section",
        Event::Comment(_) => "comment",
        Event::Decl(_) => "XML declaration",
        Event::PI(_) => "processing instruction",
        Event::DocType(_) => "DOCTYPE",
        _ => "unexpected event",
    }
    .to_owned()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;

    const MULTIPOINT: &str = concat!(
        r#"<vf:Data xmlns:vf="urn:cz:isvs:ruian:schemas:VymennyFormatTypy:v1" "#,
        r#"xmlns:gml="http://www.opengis.net/gml/3.2">"#,
        r#"<gml:MultiPoint gml:id="DOB.1" srsName="urn:ogc:def:crs:EPSG::5514" srsDimension="2">"#,
        r#"<gml:pointMembers>"#,
        r#"<gml:Point gml:id="DOB.1.1"><gml:pos>1.00 2.00</gml:pos></gml:Point>"#,
        r#"<gml:Point gml:id="DOB.1.2"><gml:pos>3.00 4.00</gml:pos></gml:Point>"#,
        r#"</gml:pointMembers>"#,
        r#"</gml:MultiPoint>"#,
        r#"</vf:Data>"#,
    );

    fn init_tracing() {
        let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    }

    /// Advances the reader to the first element with the given local name.
    fn position<'a>(xml: &'a str, local: &[u8]) -> (NsReader<&'a [u8]>, BytesStart<'static>) {
        let mut reader = NsReader::from_str(xml);
        let mut buf = Vec::new();
        loop {
            buf.clear();
            match reader.read_event_into(&mut buf).unwrap() {
                Event::Start(e) if e.local_name().as_ref() == local => {
                    return (reader, e.into_owned());
                }
                Event::Eof => panic!("element not found"),
                _ => {}
            }
        }
    }

    fn rewrite(xml: &str, root: &[u8], config: &ConvertConfig) -> String {
        let (mut reader, start) = position(xml, root);
        GmlRewriter::new(config)
            .rewrite(&mut reader, &start, None)
            .unwrap()
            .unwrap()
    }

    #[test]
    fn workaround_replaces_point_members() {
        let config = ConvertConfig {
            multipoint_bug_workaround: true,
            ..ConvertConfig::default()
        };
        let gml = rewrite(MULTIPOINT, b"MultiPoint", &config);
        assert_eq!(
            gml,
            concat!(
                r#"<gml:MultiPoint xmlns:gml="http://www.opengis.net/gml/3.2" gml:id="DOB.1" "#,
                r#"srsName="urn:ogc:def:crs:EPSG::5514" srsDimension="2">"#,
                r#"<gml:pointMember><gml:Point gml:id="DOB.1.1"><gml:pos>1.00 2.00</gml:pos></gml:Point></gml:pointMember>"#,
                r#"<gml:pointMember><gml:Point gml:id="DOB.1.2"><gml:pos>3.00 4.00</gml:pos></gml:Point></gml:pointMember>"#,
                r#"</gml:MultiPoint>"#,
            )
        );
        assert!(!gml.contains("pointMembers"));
    }

    #[test]
    fn without_workaround_structure_is_kept() {
        let gml = rewrite(MULTIPOINT, b"MultiPoint", &ConvertConfig::default());
        assert_eq!(
            gml,
            concat!(
                r#"<gml:MultiPoint xmlns:gml="http://www.opengis.net/gml/3.2" gml:id="DOB.1" "#,
                r#"srsName="urn:ogc:def:crs:EPSG::5514" srsDimension="2">"#,
                r#"<gml:pointMembers>"#,
                r#"<gml:Point gml:id="DOB.1.1"><gml:pos>1.00 2.00</gml:pos></gml:Point>"#,
                r#"<gml:Point gml:id="DOB.1.2"><gml:pos>3.00 4.00</gml:pos></gml:Point>"#,
                r#"</gml:pointMembers>"#,
                r#"</gml:MultiPoint>"#,
            )
        );
    }

    #[test]
    fn workaround_only_applies_below_multipoint() {
        let xml = concat!(
            r#"<d xmlns:g="http://www.opengis.net/gml/3.2">"#,
            r#"<g:Point g:id="P"><g:pos>1 2</g:pos></g:Point></d>"#,
        );
        let config = ConvertConfig {
            multipoint_bug_workaround: true,
            ..ConvertConfig::default()
        };
        assert_eq!(
            rewrite(xml, b"Point", &config),
            concat!(
                r#"<gml:Point xmlns:gml="http://www.opengis.net/gml/3.2" gml:id="P">"#,
                r#"<gml:pos>1 2</gml:pos></gml:Point>"#,
            )
        );
    }

    #[test]
    fn reader_is_left_after_root_end() {
        let xml = concat!(
            r#"<d xmlns:gml="http://www.opengis.net/gml/3.2">"#,
            r#"<gml:Point><gml:pos>1 2</gml:pos></gml:Point><next/></d>"#,
        );
        let (mut reader, start) = position(xml, b"Point");
        GmlRewriter::new(&ConvertConfig::default())
            .write_document(&mut reader, &start)
            .unwrap();
        let mut buf = Vec::new();
        match reader.read_event_into(&mut buf).unwrap() {
            Event::Empty(e) => assert_eq!(e.name().as_ref(), b"next"),
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn text_and_unqualified_attributes_are_copied_verbatim() {
        let xml = concat!(
            r#"<d xmlns:gml="http://www.opengis.net/gml/3.2">"#,
            r#"<gml:LineString srsName="EPSG:5514" note="a &amp; b">"#,
            "\n  <gml:posList>0 0 1 1</gml:posList>\n",
            r#"</gml:LineString></d>"#,
        );
        assert_eq!(
            rewrite(xml, b"LineString", &ConvertConfig::default()),
            concat!(
                r#"<gml:LineString xmlns:gml="http://www.opengis.net/gml/3.2" srsName="EPSG:5514" note="a &amp; b">"#,
                "\n  <gml:posList>0 0 1 1</gml:posList>\n",
                r#"</gml:LineString>"#,
            )
        );
    }

    #[test]
    fn comment_is_unsupported() {
        let xml = concat!(
            r#"<d xmlns:gml="http://www.opengis.net/gml/3.2">"#,
            r#"<gml:Point><!-- x --><gml:pos>1 2</gml:pos></gml:Point></d>"#,
        );
        let (mut reader, start) = position(xml, b"Point");
        let result = GmlRewriter::new(&ConvertConfig::default()).rewrite(&mut reader, &start, None);
        assert!(matches!(
            result,
            Err(Gml2WktError::Gml(GmlError::UnsupportedXmlEvent(_)))
        ));
    }

    #[test]
    fn truncated_stream_fails() {
        let xml = r#"<d xmlns:gml="http://www.opengis.net/gml/3.2"><gml:Point><gml:pos>1 2</gml:pos>"#;
        let (mut reader, start) = position(xml, b"Point");
        let result = GmlRewriter::new(&ConvertConfig::default()).rewrite(&mut reader, &start, None);
        assert!(result.is_err());
    }

    #[test]
    fn tolerant_mode_drops_rejected_gml() {
        init_tracing();
        let config = ConvertConfig {
            ignore_invalid_gml: true,
            ..ConvertConfig::default()
        };
        let (mut reader, start) = position(MULTIPOINT, b"MultiPoint");
        let mut reject = |_: &str| false;
        let result = GmlRewriter::new(&config)
            .rewrite(&mut reader, &start, Some(&mut reject))
            .unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn tolerant_mode_keeps_accepted_gml() {
        let config = ConvertConfig {
            ignore_invalid_gml: true,
            ..ConvertConfig::default()
        };
        let (mut reader, start) = position(MULTIPOINT, b"MultiPoint");
        let mut seen = Vec::new();
        let mut accept = |gml: &str| {
            seen.push(gml.to_owned());
            true
        };
        let result = GmlRewriter::new(&config)
            .rewrite(&mut reader, &start, Some(&mut accept))
            .unwrap();
        assert_eq!(result.as_deref(), seen.first().map(String::as_str));
    }

    #[test]
    fn strict_mode_does_not_consult_validator() {
        let (mut reader, start) = position(MULTIPOINT, b"MultiPoint");
        let mut calls = 0;
        let mut reject = |_: &str| {
            calls += 1;
            false
        };
        let result = GmlRewriter::new(&ConvertConfig::default())
            .rewrite(&mut reader, &start, Some(&mut reject))
            .unwrap();
        assert!(result.is_some());
        assert_eq!(calls, 0);
    }

    #[test]
    fn multipoint_bug_detection() {
        assert!(has_multipoint_bug("MULTIPOINT Z EMPTY"));
        assert!(!has_multipoint_bug("MULTIPOINT Z (496547 1139895 0)"));
        assert!(MULTIPOINT_BUG_PROBE.contains("<gml:pointMembers>"));
    }

    #[test]
    fn prefixes_declared_outside_the_subtree_are_redeclared() {
        let xml = concat!(
            r#"<vf:Data xmlns:vf="urn:vf" xmlns:gml="http://www.opengis.net/gml/3.2" "#,
            r#"xmlns:xlink="http://www.w3.org/1999/xlink">"#,
            r##"<gml:Point gml:id="P1" xlink:href="#a"><gml:pos>1 2</gml:pos>"##,
            r#"<vf:note xlink:title="t">x</vf:note></gml:Point></vf:Data>"#,
        );
        assert_eq!(
            rewrite(xml, b"Point", &ConvertConfig::default()),
            concat!(
                r##"<gml:Point xmlns:gml="http://www.opengis.net/gml/3.2" gml:id="P1" xlink:href="#a" "##,
                r#"xmlns:xlink="http://www.w3.org/1999/xlink"><gml:pos>1 2</gml:pos>"#,
                r#"<vf:note xlink:title="t" xmlns:vf="urn:vf">x</vf:note></gml:Point>"#,
            )
        );
    }

    #[test]
    fn local_declarations_are_kept_once() {
        let xml = concat!(
            r#"<d xmlns:gml="http://www.opengis.net/gml/3.2">"#,
            r#"<gml:Point><gml:pos>1 2</gml:pos>"#,
            r#"<x:a xmlns:x="urn:x"><x:b x:k="v"/></x:a></gml:Point></d>"#,
        );
        assert_eq!(
            rewrite(xml, b"Point", &ConvertConfig::default()),
            concat!(
                r#"<gml:Point xmlns:gml="http://www.opengis.net/gml/3.2"><gml:pos>1 2</gml:pos>"#,
                r#"<x:a xmlns:x="urn:x"><x:b x:k="v"/></x:a></gml:Point>"#,
            )
        );
    }

    #[derive(Clone, Default)]
    struct SharedLog(Arc<Mutex<Vec<u8>>>);

    impl Write for SharedLog {
        fn write(&mut self, data: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(data);
            Ok(data.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn tolerant_mode_without_validator_warns() {
        let log = SharedLog::default();
        let sink = log.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::INFO)
            .with_ansi(false)
            .with_writer(move || sink.clone())
            .finish();
        let config = ConvertConfig {
            ignore_invalid_gml: true,
            ..ConvertConfig::default()
        };

        let result = tracing::subscriber::with_default(subscriber, || {
            let (mut reader, start) = position(MULTIPOINT, b"MultiPoint");
            GmlRewriter::new(&config).rewrite(&mut reader, &start, None)
        });

        assert!(result.unwrap().is_some());
        let output = String::from_utf8(log.0.lock().unwrap().clone()).unwrap();
        assert!(output.contains("WARN"), "{output}");
        assert!(output.contains("without a GML validator"), "{output}");
    }
}
