//! Module: db::repository
//! Responsibility: orchestrate compile, cache, render and execute for the
//! tag operations callers actually run.
//! Does not own: SQL shape (see `compile`) or row-count rules (see `executor`).

use crate::{
    cache::{CacheError, TagIdCache},
    compile::{CompileResult, CompiledStatement, TagSqlCompiler},
    config::TagSqlConfig,
    db::{
        executor::{FromRow, StatementExecutor, StatementRunner, StorageFault},
        response::{Page, PageSpec},
    },
    error::Error,
    filter::Filter,
    obs::{ExecKind, GlobalMetricsSink, MetricsEvent, MetricsSink},
    tag::{NewTag, Tag, TagRecord, TagType, TagWithCount},
};
use std::sync::Arc;

///
/// TagRepository
///
/// Tag-filtered listings and tag maintenance over one executor and one
/// tag id cache. Cache writes always follow a committed store write.
///

pub struct TagRepository<X: StatementExecutor, C: TagIdCache> {
    executor: X,
    cache: C,
    compiler: TagSqlCompiler,
    sink: Arc<dyn MetricsSink>,
}

impl<X: StatementExecutor, C: TagIdCache> TagRepository<X, C> {
    /// Build a repository; the configuration is validated first.
    pub fn new(executor: X, cache: C, config: TagSqlConfig) -> Result<Self, Error> {
        config.validate()?;

        Ok(Self {
            executor,
            cache,
            compiler: TagSqlCompiler::new(config),
            sink: Arc::new(GlobalMetricsSink),
        })
    }

    /// Route this repository's metrics to `sink` instead of the global counters.
    #[must_use]
    pub fn with_metrics_sink(mut self, sink: Arc<dyn MetricsSink>) -> Self {
        self.sink = sink;
        self
    }

    #[must_use]
    pub const fn cache(&self) -> &C {
        &self.cache
    }

    #[must_use]
    pub const fn compiler(&self) -> &TagSqlCompiler {
        &self.compiler
    }

    ///
    /// CACHE
    ///

    /// Load every tag record into the cache and mark it ready.
    /// Returns the number of entries loaded.
    pub fn init_cache(&self) -> Result<usize, Error> {
        let compiled = self.compiler.compile_enumerate_tags();
        let records: Vec<TagRecord> = self.query(&compiled, |runner, stmt| {
            runner.any(&stmt.statement, &stmt.params)
        })?;

        let entries = records
            .into_iter()
            .map(|record| (record.signature(), record.id))
            .collect::<Vec<_>>();
        let count = entries.len();
        self.cache.init(entries)?;

        self.sink.record(MetricsEvent::CacheWarm {
            entries: to_u64(count),
        });
        tracing::info!(entries = count, "tag id cache warmed");

        Ok(count)
    }

    ///
    /// LISTINGS
    ///

    /// One page of entities matching `filter`, in the order its sort
    /// directives select.
    pub fn list_entities<T: FromRow>(
        &self,
        filter: &Filter,
        page: PageSpec,
    ) -> Result<Page<T>, Error> {
        let compiled = self.compile(filter)?;
        let stmt = self.compiler.list_query(compiled, page);

        self.query_page(&stmt)
    }

    /// One page of tags matching `query`, most used first.
    pub fn list_tags(&self, query: &Tag, page: PageSpec) -> Result<Page<TagWithCount>, Error> {
        let stmt = self.compiler.compile_tags_query(query, page);

        self.query_page(&stmt)
    }

    /// Every tag attached to `entity_id`, with global usage counts.
    pub fn tags_for_entity(&self, entity_id: i64) -> Result<Vec<TagWithCount>, Error> {
        let stmt = self.compiler.compile_entity_tags_query(entity_id);

        self.query(&stmt, |runner, stmt| {
            runner.any(&stmt.statement, &stmt.params)
        })
    }

    ///
    /// TAG MAINTENANCE
    ///

    /// Insert tags that do not exist yet and return only the created
    /// records. Each created record is written to the cache after the
    /// insert commits.
    pub fn create_tags(&self, tags: &[NewTag]) -> Result<Vec<TagRecord>, Error> {
        let Some(stmt) = self.compiler.compile_create_tags(tags)? else {
            return Ok(Vec::new());
        };

        let created: Vec<TagRecord> = self.query(&stmt, |runner, stmt| {
            runner.any(&stmt.statement, &stmt.params)
        })?;

        // every record is offered to the cache before a fault is reported
        let mut cache_fault = None;
        for record in &created {
            if let Err(err) = self.cache.on_tag_created(record.signature(), record.id) {
                cache_fault.get_or_insert(err);
            }
        }

        self.sink.record(MetricsEvent::TagsCreated {
            count: to_u64(created.len()),
        });
        tracing::info!(
            requested = tags.len(),
            created = created.len(),
            "tags created"
        );

        match cache_fault {
            Some(err) => Err(err.into()),
            None => Ok(created),
        }
    }

    /// Attach a known tag. Returns false when the pair already existed.
    pub fn add_tag_to_entity(&self, entity_id: i64, tag: &Tag) -> Result<bool, Error> {
        let stmt = self.compiler.compile_add_tag(entity_id, tag, &self.cache)?;

        Ok(self.write(&stmt)? > 0)
    }

    /// Detach a tag. Returns false when nothing was attached, including
    /// when the tag itself is unknown.
    pub fn remove_tag_from_entity(&self, entity_id: i64, tag: &Tag) -> Result<bool, Error> {
        let stmt = match self.compiler.compile_remove_tag(entity_id, tag, &self.cache) {
            Ok(stmt) => stmt,
            Err(err) if err.is_unknown_tag() => return Ok(false),
            Err(err) => return Err(err),
        };

        Ok(self.write(&stmt)? > 0)
    }

    /// Parse raw tag text, create the tag if the cache has never seen it,
    /// then attach it to the entity.
    pub fn attach_tag(&self, entity_id: i64, raw: &str, tag_type: TagType) -> Result<bool, Error> {
        let tag = Tag::parse(raw);

        match self.cache.lookup(&tag.signature()) {
            Ok(_) => {}
            Err(CacheError::NotFound { .. }) => {
                self.create_tags(&[NewTag::new(tag.clone(), tag_type)])?;
            }
            Err(err) => return Err(err.into()),
        }

        self.add_tag_to_entity(entity_id, &tag)
    }

    ///
    /// INTERNAL
    ///

    fn compile(&self, filter: &Filter) -> Result<CompileResult, Error> {
        let result = self.compiler.compile_filter(filter, &self.cache)?;
        let stats = result.stats;

        self.sink.record(MetricsEvent::Compile {
            tag_refs: to_u64(stats.signatures),
            family_fallbacks: to_u64(stats.family_fallbacks),
        });
        self.sink.record(MetricsEvent::CacheLookup {
            hits: to_u64(stats.resolved),
            misses: to_u64(stats.signatures.saturating_sub(stats.resolved)),
        });

        Ok(result)
    }

    fn runner(&self) -> StatementRunner<'_, X> {
        StatementRunner::new(&self.executor, self.compiler.config().dialect)
    }

    fn query<T>(
        &self,
        stmt: &CompiledStatement,
        run: impl FnOnce(
            &StatementRunner<'_, X>,
            &CompiledStatement,
        ) -> Result<Vec<T>, StorageFault>,
    ) -> Result<Vec<T>, Error> {
        let rows = self.storage(run(&self.runner(), stmt))?;
        self.sink.record(MetricsEvent::Execute {
            kind: ExecKind::Query,
            rows: to_u64(rows.len()),
        });

        Ok(rows)
    }

    fn query_page<T: FromRow>(&self, stmt: &CompiledStatement) -> Result<Page<T>, Error> {
        let page = self.storage(self.runner().page(&stmt.statement, &stmt.params))?;
        self.sink.record(MetricsEvent::Execute {
            kind: ExecKind::Query,
            rows: to_u64(page.len()),
        });

        Ok(page)
    }

    fn write(&self, stmt: &CompiledStatement) -> Result<u64, Error> {
        let affected = self.storage(self.runner().none(&stmt.statement, &stmt.params))?;
        self.sink.record(MetricsEvent::Execute {
            kind: ExecKind::Write,
            rows: affected,
        });

        Ok(affected)
    }

    fn storage<T>(&self, result: Result<T, StorageFault>) -> Result<T, Error> {
        result.map_err(|err| {
            self.sink.record(MetricsEvent::StorageFault);
            err.into()
        })
    }
}

fn to_u64(n: usize) -> u64 {
    u64::try_from(n).unwrap_or(u64::MAX)
}

///
/// TESTS
///
