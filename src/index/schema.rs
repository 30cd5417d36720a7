//! Elasticsearch index definition

/// Settings and mappings for the movies index, applied at creation time.
pub const INDEX_SCHEMA: &str = r#"
{
  "settings": {
    "refresh_interval": "1s",
    "analysis": {
      "filter": {
        "english_stemmer": {
          "type": "stemmer",
          "language": "english"
        },
        "english_possessive_stemmer": {
          "type": "stemmer",
          "language": "possessive_english"
        }
      },
      "analyzer": {
        "text_en": {
          "type": "custom",
          "tokenizer": "standard",
          "filter": [
            "lowercase",
            "english_possessive_stemmer",
            "english_stemmer"
          ]
        }
      }
    }
  },
  "mappings": {
    "dynamic": "strict",
    "properties": {
      "id": {
        "type": "keyword"
      },
      "title": {
        "type": "text",
        "analyzer": "text_en",
        "fields": {
          "raw": {
            "type": "keyword"
          }
        }
      },
      "description": {
        "type": "text",
        "analyzer": "text_en"
      },
      "rating": {
        "type": "float"
      },
      "genre": {
        "type": "keyword"
      },
      "director": {
        "type": "text",
        "analyzer": "text_en"
      },
      "actors_names": {
        "type": "text",
        "analyzer": "text_en"
      },
      "writers_names": {
        "type": "text",
        "analyzer": "text_en"
      },
      "actors": {
        "type": "nested",
        "dynamic": "strict",
        "properties": {
          "id": {
            "type": "keyword"
          },
          "name": {
            "type": "text",
            "analyzer": "text_en"
          }
        }
      },
      "writers": {
        "type": "nested",
        "dynamic": "strict",
        "properties": {
          "id": {
            "type": "keyword"
          },
          "name": {
            "type": "text",
            "analyzer": "text_en"
          }
        }
      }
    }
  }
}
"#;
