//! Decomposition of `nexdatas_source` descriptors.
//!
//! NeXus files written by the NeXDatas recorder carry the data source of
//! every field as a small XML document:
//!
//! ```xml
//! <datasource type="TANGO" name="exp_mot01">
//!   <device hostname="haso000" port="10000" member="attribute" name="p09/motor/exp.01"/>
//!   <record name="Position"/>
//! </datasource>
//! ```

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

/// Catalog view of a data source descriptor
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DataSource {
    /// Device/record address of the source
    pub source: Option<String>,
    /// Name of the data source
    pub source_name: Option<String>,
    /// Data source type (e.g. "TANGO", "CLIENT")
    pub source_type: Option<String>,
}

impl DataSource {
    /// Decompose a descriptor string
    ///
    /// Descriptors that are not a `<datasource>` XML document are kept
    /// verbatim as `source`.
    pub fn parse(descriptor: &str) -> Self {
        parse_xml(descriptor).unwrap_or_else(|| DataSource {
            source: Some(descriptor.to_string()),
            ..Default::default()
        })
    }
}

fn parse_xml(descriptor: &str) -> Option<DataSource> {
    let mut reader = Reader::from_str(descriptor.trim());
    reader.config_mut().trim_text(true);

    let mut found = false;
    let mut result = DataSource::default();
    let mut device: Option<String> = None;
    let mut address: Option<String> = None;
    let mut record: Option<String> = None;

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) | Ok(Event::Empty(ref e)) => match e.name().as_ref() {
                b"datasource" if !found => {
                    found = true;
                    result.source_type = get_attribute(e, "type");
                    result.source_name = get_attribute(e, "name");
                }
                b"device" => {
                    device = get_attribute(e, "name");
                    if let (Some(host), Some(port)) =
                        (get_attribute(e, "hostname"), get_attribute(e, "port"))
                    {
                        address = Some(format!("{}:{}", host, port));
                    }
                }
                b"record" => record = get_attribute(e, "name"),
                _ => {}
            },
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(_) => return None,
        }
    }

    if !found {
        return None;
    }
    let parts: Vec<String> = [address, device, record].into_iter().flatten().collect();
    if !parts.is_empty() {
        result.source = Some(parts.join("/"));
    }
    Some(result)
}

fn get_attribute(e: &BytesStart, name: &str) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|attr| attr.key.as_ref() == name.as_bytes())
        .and_then(|attr| std::str::from_utf8(&attr.value).ok().map(str::to_string))
}
