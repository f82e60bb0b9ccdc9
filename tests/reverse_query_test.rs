use tempfile::TempDir;

use silene::journal::{DocRecord, JournalReader, JournalWriter, Posting, WordFilter};
use silene::model::meta::word_flags;
use silene::model::{id, meta};
use silene::progress::{Interrupt, NullProgress};
use silene::reverse::{AllOfStep, AnyOfStep};
use silene::storage::files::ReverseFileSet;
use silene::{
    BTreeContext, DomainRankings, EntrySource, FilterStep, QueryBuffer, ReverseIndexBuilder,
    ReverseIndexReader, VarintSequence, hash_keyword,
};

const TEST_CTX: BTreeContext = BTreeContext::new(4, 2, 3);
const N_DOCS: u32 = 48;

// A corpus of 48 documents over four domains:
//   "gamma" in every document,
//   "alpha" in even ordinals,
//   "beta"  in ordinals divisible by three.
// Postings of every fourth document carry the title flag.
struct Corpus {
    _tmp: TempDir,
    files: ReverseFileSet,
    filtered: ReverseFileSet,
    rankings: DomainRankings,
}

fn domain_of(ordinal: u32) -> u32 {
    ordinal % 4
}

fn rank_of(domain_id: u32) -> u32 {
    // Domain 1 ranks best, then 3, 2, 0.
    [3, 0, 2, 1][domain_id as usize]
}

fn ranked_id(ordinal: u32) -> u64 {
    let domain_id = domain_of(ordinal);
    id::with_rank(rank_of(domain_id), id::encode_doc_id(domain_id, ordinal))
}

fn expected_ids<I: IntoIterator<Item = u32>>(ordinals: I) -> Vec<u64> {
    let mut ids: Vec<u64> = ordinals.into_iter().map(ranked_id).collect();
    ids.sort_unstable();
    ids
}

fn build_corpus() -> Corpus {
    let tmp = TempDir::new().unwrap();
    let journal_dir = tmp.path().join("journal");
    let mut writer = JournalWriter::new(&journal_dir).unwrap();

    for ordinal in 0..N_DOCS {
        let mut terms = vec!["gamma"];
        if ordinal % 2 == 0 {
            terms.push("alpha");
        }
        if ordinal % 3 == 0 {
            terms.push("beta");
        }
        let flags = if ordinal % 4 == 0 { word_flags::TITLE } else { 0 };
        let postings = terms
            .into_iter()
            .map(|term| Posting {
                term_id: hash_keyword(term),
                meta: meta::encode_word_meta(flags, 1),
                positions: VarintSequence::encode(&[ordinal + 1]).unwrap(),
            })
            .collect();

        writer
            .put(&DocRecord {
                doc_id: id::encode_doc_id(domain_of(ordinal), ordinal),
                doc_meta: 0,
                features: 0,
                size: 10,
                postings,
                spans: Vec::new(),
            })
            .unwrap();
    }
    writer.close().unwrap();

    let journal = JournalReader::open(&journal_dir).unwrap();
    let rankings = DomainRankings::from_pairs((0..4).map(|d| (d, rank_of(d))));

    let files = ReverseFileSet {
        words: tmp.path().join("full-words.dat"),
        docs: tmp.path().join("full-docs.dat"),
    };
    ReverseIndexBuilder::new(files.clone(), &tmp.path().join("work"))
        .with_context(TEST_CTX)
        .convert(&journal, &rankings, &NullProgress, &Interrupt::new())
        .unwrap();

    let filtered = ReverseFileSet {
        words: tmp.path().join("prio-words.dat"),
        docs: tmp.path().join("prio-docs.dat"),
    };
    ReverseIndexBuilder::new(filtered.clone(), &tmp.path().join("work"))
        .with_context(TEST_CTX)
        .with_filter(WordFilter::with_flags(word_flags::TITLE))
        .convert(&journal, &rankings, &NullProgress, &Interrupt::new())
        .unwrap();

    Corpus { _tmp: tmp, files, filtered, rankings }
}

fn read_all(source: &mut dyn EntrySource, batch: usize) -> Vec<u64> {
    let mut buffer = QueryBuffer::new(batch);
    let mut ids = Vec::new();
    while source.has_more() {
        source.read(&mut buffer);
        ids.extend_from_slice(buffer.as_slice());
    }
    ids
}

#[test]
fn test_intersection_of_three_terms() {
    let corpus = build_corpus();
    let reader = ReverseIndexReader::open(TEST_CTX, &corpus.files).unwrap();

    // Drive from beta, the rarest term, and filter by the others.
    let mut buffer = QueryBuffer::new(64);
    let mut source = reader.entry_source(hash_keyword("beta"));
    source.read(&mut buffer);
    assert_eq!(buffer.size(), 16);

    let all = AllOfStep::new(vec![
        Box::new(reader.retain_filter(hash_keyword("alpha"))),
        Box::new(reader.retain_filter(hash_keyword("gamma"))),
    ]);
    all.apply(&mut buffer);

    assert_eq!(buffer.as_slice(), expected_ids((0..N_DOCS).filter(|o| o % 6 == 0)));
}

#[test]
fn test_results_follow_domain_rank() {
    let corpus = build_corpus();
    let reader = ReverseIndexReader::open(TEST_CTX, &corpus.files).unwrap();

    let mut source = reader.entry_source(hash_keyword("gamma"));
    let ids = read_all(source.as_mut(), 7);
    assert_eq!(ids.len(), N_DOCS as usize);

    // Ids come back ascending, which groups documents best rank first.
    assert!(ids.windows(2).all(|w| w[0] < w[1]));
    let ranks: Vec<u32> = ids.iter().map(|&i| id::rank(i)).collect();
    assert!(ranks.windows(2).all(|w| w[0] <= w[1]));

    // The leading run is the rank-0 domain.
    for &doc_id in &ids[..7] {
        assert_eq!(id::rank(doc_id), 0);
        assert_eq!(id::domain_id(id::without_rank(doc_id)), 1);
    }
    assert_eq!(ids, expected_ids(0..N_DOCS));
}

#[test]
fn test_skip_jumps_over_entries() {
    let corpus = build_corpus();
    let reader = ReverseIndexReader::open(TEST_CTX, &corpus.files).unwrap();
    let expected = expected_ids(0..N_DOCS);

    let mut source = reader.entry_source(hash_keyword("gamma"));
    source.skip(40);
    let tail = read_all(source.as_mut(), 7);
    assert_eq!(tail, expected[40..]);

    // Skipping past the end just exhausts the source.
    let mut source = reader.entry_source(hash_keyword("gamma"));
    source.skip(1000);
    assert!(!source.has_more());
}

#[test]
fn test_rejection_complement() {
    let corpus = build_corpus();
    let reader = ReverseIndexReader::open(TEST_CTX, &corpus.files).unwrap();

    let mut buffer = QueryBuffer::new(64);
    let mut source = reader.entry_source(hash_keyword("beta"));
    source.read(&mut buffer);
    reader.reject_filter(hash_keyword("alpha")).apply(&mut buffer);

    assert_eq!(
        buffer.as_slice(),
        expected_ids((0..N_DOCS).filter(|o| o % 3 == 0 && o % 2 != 0))
    );
}

#[test]
fn test_any_of_combination() {
    let corpus = build_corpus();
    let reader = ReverseIndexReader::open(TEST_CTX, &corpus.files).unwrap();

    let mut buffer = QueryBuffer::new(64);
    let mut source = reader.entry_source(hash_keyword("gamma"));
    source.read(&mut buffer);

    let any = AnyOfStep::new(vec![
        Box::new(reader.retain_filter(hash_keyword("alpha"))),
        Box::new(reader.retain_filter(hash_keyword("beta"))),
    ]);
    any.apply(&mut buffer);

    let expected = expected_ids((0..N_DOCS).filter(|o| o % 2 == 0 || o % 3 == 0));
    assert_eq!(expected.len(), 32);
    assert_eq!(buffer.as_slice(), expected);
}

#[test]
fn test_priority_index_is_a_subset() {
    let corpus = build_corpus();
    let full = ReverseIndexReader::open(TEST_CTX, &corpus.files).unwrap();
    let priority = ReverseIndexReader::open(TEST_CTX, &corpus.filtered).unwrap();

    // Both indexes list all three terms.
    assert_eq!(full.num_terms(), 3);
    assert_eq!(priority.num_terms(), 3);

    // The priority index keeps only title-flagged postings.
    let alpha = hash_keyword("alpha");
    assert_eq!(full.num_documents(alpha), 24);
    assert_eq!(priority.num_documents(alpha), 12);
    assert_eq!(priority.num_documents(hash_keyword("beta")), 4);

    let mut source = priority.entry_source(alpha);
    for doc_id in read_all(source.as_mut(), 8) {
        assert!(full.has_document(alpha, doc_id));
        assert_eq!(id::ordinal(id::without_rank(doc_id)) % 4, 0);
    }
}

#[test]
fn test_metadata_flags_survive() {
    let corpus = build_corpus();
    let reader = ReverseIndexReader::open(TEST_CTX, &corpus.files).unwrap();
    let gamma = hash_keyword("gamma");

    let flagged = ranked_id(0);
    let plain = ranked_id(1);
    assert!(meta::has_flags(reader.metadata_for(gamma, flagged), word_flags::TITLE));
    assert!(!meta::has_flags(reader.metadata_for(gamma, plain), word_flags::TITLE));
    // The rankings used at build time stay recorded in the ids.
    assert_eq!(corpus.rankings.rank(1), 0);
    assert_eq!(id::rank(plain), 0);
}
