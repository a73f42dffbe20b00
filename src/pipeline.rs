use anyhow::Result;
use bstr::ByteSlice;
use camino::Utf8Path;
use field_extract::FieldExtractor;
use ripline::{
    line_buffer::{LineBufferBuilder, LineBufferReader},
    lines::LineIter,
};
use std::io::{self, Read, Write};
use tracing::{error, info};

use crate::annotate::LineAnnotator;
use crate::input::FileOrStdin;
use crate::resolver::{OwnerLookup, OwnershipResult, OwnershipResolver};

/// Lines without this marker are dropped in interactions-only mode.
pub const INTERACTION_MARKER: &str = "IDs:";

/// Counters for one pipeline run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RunStats {
    pub lines_read: usize,
    pub lines_written: usize,
    pub lookups: usize,
    pub cache_hits: usize,
}

/// Extract, resolve and annotate, one line at a time, in input order.
pub struct Pipeline<'c, L> {
    extractor: FieldExtractor,
    annotator: LineAnnotator,
    resolver: OwnershipResolver<'c, L>,
    only_interactions: bool,
    lines_read: usize,
    lines_written: usize,
}

impl<'c, L: OwnerLookup> Pipeline<'c, L> {
    pub fn new(
        extractor: FieldExtractor,
        annotator: LineAnnotator,
        resolver: OwnershipResolver<'c, L>,
    ) -> Self {
        Self {
            extractor,
            annotator,
            resolver,
            only_interactions: false,
            lines_read: 0,
            lines_written: 0,
        }
    }

    /// Only process lines containing [`INTERACTION_MARKER`]; drop the rest.
    pub fn only_interactions(mut self, yes: bool) -> Self {
        self.only_interactions = yes;
        self
    }

    /// Annotate a single line without its terminator. Returns `None` when the
    /// line is filtered out.
    pub fn process_line(&mut self, line: &str) -> Option<String> {
        self.lines_read += 1;
        if self.only_interactions && !line.contains(INTERACTION_MARKER) {
            return None;
        }

        self.lines_written += 1;
        // nothing to annotate, so nothing worth looking up
        if !self.annotator.accepts(line) {
            return Some(line.to_owned());
        }

        let fields = self.extractor.extract(line);
        let resolutions: Vec<OwnershipResult> = fields
            .ips
            .iter()
            .map(|ip| self.resolver.resolve(ip))
            .collect();

        Some(self.annotator.annotate(line, &fields, &resolutions))
    }

    /// Process every line of `reader`, writing annotated lines to `out`.
    ///
    /// `out` is flushed after every filled batch, so lines from a stream that
    /// stays open (`tail -f`) show up as soon as they are read.
    pub fn process<R: Read, W: Write>(&mut self, reader: R, out: &mut W) -> io::Result<()> {
        let mut line_buffer = LineBufferBuilder::new().capacity(65536).build();
        let mut lb_reader = LineBufferReader::new(reader, &mut line_buffer);

        while lb_reader.fill()? {
            let buffer = lb_reader.buffer();
            for raw in LineIter::new(b'\n', buffer) {
                let raw = raw.strip_suffix(b"\n").unwrap_or(raw);
                let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
                let text = raw.to_str_lossy();

                if let Some(annotated) = self.process_line(&text) {
                    out.write_all(annotated.as_bytes())?;
                    out.write_all(b"\n")?;
                }
            }
            lb_reader.consume_all();
            out.flush()?;
        }
        Ok(())
    }

    /// Process each source in order, then persist the cache to `cache_path`.
    ///
    /// The cache is written even when a source fails part-way; the failure is
    /// returned afterwards.
    pub fn run<W: Write>(
        mut self,
        sources: &[FileOrStdin],
        out: &mut W,
        cache_path: &Utf8Path,
    ) -> Result<RunStats> {
        let outcome = sources.iter().try_for_each(|source| -> Result<()> {
            let reader = source.reader()?;
            self.process(reader, out)?;
            Ok(())
        });

        let stats = self.finish(cache_path);
        outcome.map(|()| stats)
    }

    pub fn stats(&self) -> RunStats {
        RunStats {
            lines_read: self.lines_read,
            lines_written: self.lines_written,
            lookups: self.resolver.lookups(),
            cache_hits: self.resolver.hits(),
        }
    }

    /// Persist the cache. A failed write is logged, never returned.
    pub fn finish(self, cache_path: &Utf8Path) -> RunStats {
        let stats = self.stats();
        let cache = self.resolver.cache();

        match cache.save(cache_path) {
            Ok(()) => info!(path = %cache_path, entries = cache.len(), "saved cache"),
            Err(err) => error!("{:#}", anyhow::Error::from(err)),
        }

        info!(
            lines_read = stats.lines_read,
            lines_written = stats.lines_written,
            lookups = stats.lookups,
            cache_hits = stats.cache_hits,
            "done"
        );
        stats
    }
}
