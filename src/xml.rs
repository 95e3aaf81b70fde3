//! Embedded XML configuration decoding.
//!
//! XML0 datagrams carry one structured-text document each. Only three root
//! kinds affect telemetry: `Configuration` (declares the channel table),
//! `Environment` (current sound speed), and `Parameter` (per-channel
//! frequency span widening plus the sample interval and transducer depth
//! used by the next ping record). Every other root kind is consumed and
//! ignored.
//!
//! This is deliberately not a general XML parser. The documents these
//! instruments write are machine-generated, double-quoted and entity-free,
//! so a flat element/attribute scan over exactly the shapes they emit is
//! all that is needed.

use std::str::FromStr;

use crate::telemetry::{Channel, Telemetry};
use crate::{Error, Result};

/// Apply one embedded XML document to the accumulator.
pub(crate) fn apply(xml: &str, telemetry: &mut Telemetry) -> Result<()> {
    let root = root_name(xml).ok_or_else(|| Error::malformed("XML0", "no root element"))?;
    match root {
        "Configuration" => configuration(xml, telemetry),
        "Environment" => environment(xml, telemetry),
        "Parameter" => parameter(xml, telemetry),
        _ => Ok(()),
    }
}

/// Seed the channel table: one entry per declared channel, frequency span
/// collapsed to the transducer's base frequency.
fn configuration(xml: &str, telemetry: &mut Telemetry) -> Result<()> {
    for (offset, channel) in elements(xml, "Channel") {
        let id = required(channel, "ChannelID")?;

        // The frequency and beam type live on the Transducer element
        // nested inside this Channel.
        let span_end = xml[offset..]
            .find("</Channel>")
            .map_or(xml.len(), |end| offset + end);
        let transducer = elements(&xml[offset..span_end], "Transducer")
            .into_iter()
            .next()
            .map(|(_, element)| element)
            .ok_or_else(|| Error::malformed("XML0", format!("channel {id} has no transducer")))?;

        let frequency: f64 = number(transducer, "Frequency")?;
        let beam_type: i32 = number(transducer, "BeamType")?;
        telemetry.channels.insert(
            id.to_string(),
            Channel {
                min_frequency: frequency,
                max_frequency: frequency,
                beam_type,
            },
        );
    }
    Ok(())
}

/// Capture the current sound speed for range estimation.
fn environment(xml: &str, telemetry: &mut Telemetry) -> Result<()> {
    let (_, root) = elements(xml, "Environment")
        .into_iter()
        .next()
        .ok_or_else(|| Error::malformed("XML0", "no Environment element"))?;
    telemetry.sound_speed = Some(number(root, "SoundSpeed")?);
    Ok(())
}

/// Widen the named channel's frequency span and capture the sample
/// interval and transducer depth for the next ping record.
fn parameter(xml: &str, telemetry: &mut Telemetry) -> Result<()> {
    let (_, channel) = elements(xml, "Channel")
        .into_iter()
        .next()
        .ok_or_else(|| Error::malformed("XML0", "parameter without channel"))?;
    let id = required(channel, "ChannelID")?;

    // Wideband transmissions declare a start/end range; narrowband ones a
    // single frequency.
    let (min, max) = if xml.contains("FrequencyStart") {
        (
            number(channel, "FrequencyStart")?,
            number(channel, "FrequencyEnd")?,
        )
    } else {
        let frequency: f64 = number(channel, "Frequency")?;
        (frequency, frequency)
    };

    let entry = telemetry
        .channels
        .get_mut(id)
        .ok_or_else(|| Error::malformed("XML0", format!("parameter for unknown channel {id}")))?;
    entry.widen(min, max);

    telemetry.sample_interval = Some(number(channel, "SampleInterval")?);
    telemetry.transducer_depth = Some(
        attr(channel, "TransducerDepth")
            .and_then(|value| value.parse().ok())
            .unwrap_or(0.0),
    );
    Ok(())
}

/// Name of the document's root element, skipping the declaration and any
/// comments or processing instructions before it.
fn root_name(xml: &str) -> Option<&str> {
    let mut rest = xml;
    loop {
        let start = rest.find('<')?;
        rest = &rest[start + 1..];
        match rest.chars().next()? {
            '?' | '!' => continue,
            _ => break,
        }
    }
    let end = rest.find(|c: char| c.is_whitespace() || c == '>' || c == '/')?;
    Some(&rest[..end])
}

/// All `<name …>` start tags, as (byte offset, attribute region) pairs.
fn elements<'a>(xml: &'a str, name: &str) -> Vec<(usize, &'a str)> {
    let pattern = format!("<{name}");
    let mut found = Vec::new();
    for (offset, _) in xml.match_indices(&pattern) {
        let after = offset + pattern.len();
        // Reject prefix matches like <Channels for <Channel
        match xml[after..].chars().next() {
            Some(c) if c.is_whitespace() || c == '>' || c == '/' => {}
            _ => continue,
        }
        if let Some(end) = xml[after..].find('>') {
            found.push((offset, &xml[after..after + end]));
        }
    }
    found
}

/// Value of a double-quoted attribute inside a start tag's attribute
/// region, or `None` if absent.
fn attr<'a>(element: &'a str, name: &str) -> Option<&'a str> {
    for (offset, _) in element.match_indices(name) {
        // The name must be a whole token preceded by whitespace
        if offset == 0 || !element[..offset].ends_with(|c: char| c.is_whitespace()) {
            continue;
        }
        let rest = &element[offset + name.len()..];
        let Some(rest) = rest.strip_prefix("=\"") else {
            continue;
        };
        return rest.find('"').map(|end| &rest[..end]);
    }
    None
}

fn required<'a>(element: &'a str, name: &'static str) -> Result<&'a str> {
    attr(element, name).ok_or_else(|| Error::malformed("XML0", format!("missing {name} attribute")))
}

fn number<T: FromStr>(element: &str, name: &'static str) -> Result<T> {
    required(element, name)?
        .parse()
        .map_err(|_| Error::malformed("XML0", format!("unparsable {name} attribute")))
}
