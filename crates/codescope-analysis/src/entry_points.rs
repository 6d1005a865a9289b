use codescope_core::{
    cancellable, Embedder, EntryPoint, EntryPointSource, HybridConfig, Intent, Result, Store,
};
use rustc_hash::FxHashMap;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Discovery keystone threshold. Looser than the authoritative metrics
/// definition on purpose: at entry-point time a promising hub should float
/// to the top even before it clears the strict bar.
const DISCOVERY_KEYSTONE_PAGERANK: f64 = 0.15;

/// Maximum entry points handed to the assembler.
const MAX_ENTRY_POINTS: usize = 10;

struct Candidate {
    entry: EntryPoint,
}

/// Hybrid entry-point discovery: explicit mentions, lexical search, a
/// per-keyword fallback for AND-combining backends, and an optional
/// semantic pass, merged per entity and scored with the configured weights.
pub struct EntryPointFinder<'a> {
    store: &'a dyn Store,
    embedder: Option<&'a dyn Embedder>,
    config: HybridConfig,
}

impl<'a> EntryPointFinder<'a> {
    pub fn new(
        store: &'a dyn Store,
        embedder: Option<&'a dyn Embedder>,
        config: HybridConfig,
    ) -> Self {
        Self {
            store,
            embedder,
            config,
        }
    }

    pub async fn find(
        &self,
        description: &str,
        intent: &Intent,
        cancel: &CancellationToken,
    ) -> Result<Vec<EntryPoint>> {
        self.config.validate()?;

        let mut candidates: Vec<Candidate> = Vec::new();
        let mut by_id: FxHashMap<String, usize> = FxHashMap::default();

        // Explicit mentions outrank everything else discovered lexically.
        for mention in &intent.entity_mentions {
            let hits = match cancellable(cancel, self.store.search_entities(mention, 5)).await {
                Ok(hits) => hits,
                Err(e) if e.is_degradable() => {
                    warn!(mention, error = %e, "mention search failed, skipping");
                    continue;
                }
                Err(e) => return Err(e),
            };
            for hit in hits {
                if by_id.contains_key(&hit.entity.id) {
                    continue;
                }
                by_id.insert(hit.entity.id.clone(), candidates.len());
                candidates.push(Candidate {
                    entry: EntryPoint {
                        entity: hit.entity,
                        relevance: hit.combined_score * 1.5,
                        source: EntryPointSource::ExplicitMention,
                        keyword_score: hit.combined_score,
                        semantic_score: 0.0,
                        pagerank: hit.pagerank,
                        is_keystone: false,
                        reason: format!("Explicitly mentioned in task: {}", mention),
                    },
                });
            }
        }

        // Joined lexical pass over generic keywords.
        let mut lexical_hits = 0usize;
        if !intent.keywords.is_empty() {
            let joined = intent.keywords.join(" ");
            match cancellable(
                cancel,
                self.store.search_entities(&joined, self.config.search_limit),
            )
            .await
            {
                Ok(hits) => {
                    for hit in hits {
                        lexical_hits += 1;
                        if by_id.contains_key(&hit.entity.id) {
                            continue;
                        }
                        by_id.insert(hit.entity.id.clone(), candidates.len());
                        candidates.push(Candidate {
                            entry: EntryPoint {
                                entity: hit.entity,
                                relevance: hit.combined_score,
                                source: EntryPointSource::KeywordMatch,
                                keyword_score: hit.combined_score,
                                semantic_score: 0.0,
                                pagerank: hit.pagerank,
                                is_keystone: false,
                                reason: format!("Keyword match: {}", joined),
                            },
                        });
                    }
                }
                // A failed lexical pass after explicit-mention hits is not
                // fatal; with nothing found at all it is.
                Err(e) if e.is_degradable() && !candidates.is_empty() => {
                    warn!(error = %e, "lexical search failed, keeping mention hits");
                }
                Err(e) if matches!(e, codescope_core::CodescopeError::Cancelled) => return Err(e),
                Err(e) if candidates.is_empty() => return Err(e),
                Err(e) => {
                    warn!(error = %e, "lexical search failed, keeping mention hits");
                }
            }
        }

        // Per-keyword fallback for backends that AND-combine terms.
        if lexical_hits < 3 && intent.keywords.len() > 1 {
            for keyword in intent.keywords.iter().filter(|k| k.len() >= 3) {
                let hits = match cancellable(cancel, self.store.search_entities(keyword, 5)).await
                {
                    Ok(hits) => hits,
                    Err(e) if e.is_degradable() => {
                        warn!(keyword, error = %e, "fallback search failed, skipping");
                        continue;
                    }
                    Err(e) => return Err(e),
                };
                for hit in hits {
                    if by_id.contains_key(&hit.entity.id) {
                        continue;
                    }
                    by_id.insert(hit.entity.id.clone(), candidates.len());
                    candidates.push(Candidate {
                        entry: EntryPoint {
                            entity: hit.entity,
                            relevance: hit.combined_score * 0.8,
                            source: EntryPointSource::KeywordMatch,
                            keyword_score: hit.combined_score * 0.8,
                            semantic_score: 0.0,
                            pagerank: hit.pagerank,
                            is_keystone: false,
                            reason: format!("Keyword match: {}", keyword),
                        },
                    });
                }
            }
        }

        // Semantic pass; absence of embeddings disables it with a warning
        // rather than aborting the query.
        if let Some(embedder) = self.embedder {
            if !self.config.disable_semantic {
                self.semantic_pass(embedder, description, &mut candidates, &mut by_id, cancel)
                    .await?;
            }
        }

        self.score_and_rank(candidates, cancel).await
    }

    async fn semantic_pass(
        &self,
        embedder: &dyn Embedder,
        description: &str,
        candidates: &mut Vec<Candidate>,
        by_id: &mut FxHashMap<String, usize>,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let embedded = cancellable(cancel, self.store.embedding_count()).await?;
        if embedded == 0 {
            warn!("no embeddings in store, semantic pass disabled");
            return Ok(());
        }

        let query_vec = match cancellable(cancel, embedder.embed(description)).await {
            Ok(vec) => vec,
            Err(e) if e.is_degradable() => {
                warn!(error = %e, "query embedding failed, semantic pass disabled");
                return Ok(());
            }
            Err(e) => return Err(e),
        };

        let limit = std::cmp::max(40, self.config.search_limit * 2);
        let similar = cancellable(cancel, self.store.find_similar(&query_vec, limit)).await?;
        debug!(hits = similar.len(), "semantic candidates");

        for hit in similar {
            if let Some(&idx) = by_id.get(&hit.entity_id) {
                let entry = &mut candidates[idx].entry;
                if entry.source == EntryPointSource::KeywordMatch {
                    entry.source = EntryPointSource::HybridMatch;
                    entry.semantic_score = hit.similarity as f64;
                    entry.reason = "Hybrid match: keyword + semantic".to_string();
                } else if entry.source == EntryPointSource::ExplicitMention {
                    entry.semantic_score = hit.similarity as f64;
                }
                continue;
            }
            let entity = match cancellable(cancel, self.store.get_entity(&hit.entity_id)).await {
                Ok(Some(entity)) => entity,
                Ok(None) => continue,
                Err(e) if e.is_degradable() => continue,
                Err(e) => return Err(e),
            };
            by_id.insert(hit.entity_id.clone(), candidates.len());
            candidates.push(Candidate {
                entry: EntryPoint {
                    entity,
                    relevance: hit.similarity as f64,
                    source: EntryPointSource::SemanticMatch,
                    keyword_score: 0.0,
                    semantic_score: hit.similarity as f64,
                    pagerank: 0.0,
                    is_keystone: false,
                    reason: format!("Semantic similarity: {:.2}", hit.similarity),
                },
            });
        }
        Ok(())
    }

    async fn score_and_rank(
        &self,
        mut candidates: Vec<Candidate>,
        cancel: &CancellationToken,
    ) -> Result<Vec<EntryPoint>> {
        // Metric lookups degrade silently: a candidate without metrics just
        // scores with pagerank zero.
        for candidate in candidates.iter_mut() {
            match cancellable(
                cancel,
                self.store.get_metrics(&candidate.entry.entity.id),
            )
            .await
            {
                Ok(Some(metrics)) => candidate.entry.pagerank = metrics.pagerank,
                Ok(None) => {}
                Err(e) if e.is_degradable() => {}
                Err(e) => return Err(e),
            }
        }

        let pagerank_max = candidates
            .iter()
            .map(|c| c.entry.pagerank)
            .fold(0.0f64, f64::max);

        let w = &self.config;
        for candidate in candidates.iter_mut() {
            let entry = &mut candidate.entry;
            let norm_pr = if pagerank_max > 0.0 {
                entry.pagerank / pagerank_max
            } else {
                0.0
            };
            entry.relevance = match entry.source {
                EntryPointSource::HybridMatch => {
                    w.semantic_weight * entry.semantic_score
                        + w.keyword_weight * entry.keyword_score
                        + w.pagerank_weight * norm_pr
                }
                EntryPointSource::SemanticMatch => {
                    (w.semantic_weight + 0.5 * w.keyword_weight) * entry.semantic_score
                        + w.pagerank_weight * norm_pr
                }
                EntryPointSource::KeywordMatch => {
                    (w.keyword_weight + 0.5 * w.semantic_weight) * entry.keyword_score
                        + w.pagerank_weight * norm_pr
                }
                EntryPointSource::ExplicitMention => entry.relevance * 1.5,
            };
            entry.is_keystone = entry.pagerank >= DISCOVERY_KEYSTONE_PAGERANK;
        }

        let mut entries: Vec<EntryPoint> =
            candidates.into_iter().map(|c| c.entry).collect();
        entries.sort_by(|a, b| {
            b.is_keystone.cmp(&a.is_keystone).then_with(|| {
                b.relevance
                    .partial_cmp(&a.relevance)
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
        });
        entries.truncate(MAX_ENTRY_POINTS);
        debug!(count = entries.len(), "entry points ranked");
        Ok(entries)
    }
}
